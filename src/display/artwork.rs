//! Album artwork fetching and decoding

use anyhow::{anyhow, bail, Context, Result};
use egui::ColorImage;
use image::imageops::FilterType;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Loads artwork references into square RGBA images
#[derive(Clone)]
pub struct ArtworkLoader {
    client: reqwest::Client,
    size: u32,
}

impl ArtworkLoader {
    /// `size` is the edge of the square the artwork is scaled to
    pub fn new(size: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build artwork HTTP client")?;
        Ok(Self { client, size })
    }

    /// Fetch and decode; any failure means "no artwork"
    pub async fn load(&self, reference: &str) -> Option<ColorImage> {
        let bytes = match self.fetch(reference).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Artwork {} unavailable: {:#}", reference, e);
                return None;
            }
        };

        let size = self.size;
        match tokio::task::spawn_blocking(move || decode(&bytes, size)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                debug!("Artwork {} not decodable: {:#}", reference, e);
                None
            }
            Err(e) => {
                debug!("Artwork decode task failed: {}", e);
                None
            }
        }
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let url = Url::parse(reference).with_context(|| format!("Invalid artwork URL {}", reference))?;

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("Not a local path: {}", reference))?;
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))
            }
            "http" | "https" => {
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            other => bail!("Unsupported artwork scheme: {}", other),
        }
    }
}

/// Decode any supported format and scale it to `size` x `size`
pub fn decode(bytes: &[u8], size: u32) -> Result<ColorImage> {
    let image = image::load_from_memory(bytes).context("Unknown image format")?;
    let rgba = image.resize_exact(size, size, FilterType::Triangle).to_rgba8();
    let dims = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(dims, rgba.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 2, Rgba([200, 30, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_scales_to_square() {
        let image = decode(&png_bytes(), 16).unwrap();
        assert_eq!(image.size, [16, 16]);
        assert_eq!(image.pixels[0].r(), 200);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"definitely not an image", 16).is_err());
    }

    #[tokio::test]
    async fn test_load_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover art.png");
        std::fs::write(&path, png_bytes()).unwrap();
        let reference = Url::from_file_path(&path).unwrap().to_string();

        let loader = ArtworkLoader::new(8, Duration::from_secs(1)).unwrap();
        let image = loader.load(&reference).await.unwrap();
        assert_eq!(image.size, [8, 8]);
    }

    #[tokio::test]
    async fn test_load_failures_yield_none() {
        let loader = ArtworkLoader::new(8, Duration::from_secs(1)).unwrap();
        assert!(loader.load("file:///nonexistent/cover.jpg").await.is_none());
        assert!(loader.load("ftp://example.org/cover.jpg").await.is_none());
        assert!(loader.load("not a url").await.is_none());
    }
}
