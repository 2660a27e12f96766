//! Knob percentage <-> mixer fraction conversion

use crate::config::{VolumeConfig, VolumeRange};

/// Maps knob percentages onto the mixer's fractional volume scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMapping {
    pub range: VolumeRange,
    pub min: f64,
    pub max: f64,
}

impl VolumeMapping {
    pub fn from_config(config: &VolumeConfig) -> Self {
        Self {
            range: config.range,
            min: config.min,
            max: config.max,
        }
    }

    /// Convert a knob percentage to a mixer fraction inside `[min, max]`
    pub fn to_fraction(&self, percent: u16) -> f64 {
        let top = self.range.max_percent();
        let p = f64::from(percent.min(top)) / f64::from(top);
        (self.min + (self.max - self.min) * p).clamp(self.min, self.max)
    }

    /// Mixer argument for a knob percentage
    pub fn format(&self, percent: u16) -> String {
        format_fraction(self.to_fraction(percent))
    }
}

/// Format a fraction with the precision `wpctl set-volume` expects
pub fn format_fraction(fraction: f64) -> String {
    format!("{:.3}", fraction)
}

/// Convert a mixer fraction to a display percentage (1.0 == 100%)
pub fn fraction_to_percent(fraction: f64) -> u16 {
    (fraction.max(0.0) * 100.0).round().min(f64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(range: VolumeRange) -> VolumeMapping {
        VolumeMapping {
            range,
            min: 0.05,
            max: 0.95,
        }
    }

    #[test]
    fn test_endpoints_map_to_bounds() {
        let m = mapping(VolumeRange::Standard);
        assert_eq!(m.format(0), "0.050");
        assert_eq!(m.format(100), "0.950");
        assert_eq!(m.format(50), "0.500");
    }

    #[test]
    fn test_out_of_range_percent_clamped() {
        let m = mapping(VolumeRange::Standard);
        assert_eq!(m.format(150), "0.950");
    }

    #[test]
    fn test_overdrive_scale() {
        let m = VolumeMapping {
            range: VolumeRange::Overdrive,
            min: 0.0,
            max: 1.5,
        };
        assert_eq!(m.format(150), "1.500");
        assert_eq!(m.format(100), "1.000");
        assert_eq!(m.format(0), "0.000");
    }

    #[test]
    fn test_mapping_is_monotonic() {
        let m = mapping(VolumeRange::Standard);
        let mut last = m.to_fraction(0);
        for p in 1..=100 {
            let f = m.to_fraction(p);
            assert!(f >= last);
            last = f;
        }
    }

    #[test]
    fn test_fraction_to_percent() {
        assert_eq!(fraction_to_percent(0.45), 45);
        assert_eq!(fraction_to_percent(1.234), 123);
        assert_eq!(fraction_to_percent(-0.2), 0);
    }
}
