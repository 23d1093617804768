use anyhow::{Result, anyhow};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};

/// Thumbnail edge length in pixels (thumbnails are square)
pub const THUMB_SIZE: u32 = 200;

/// JPEG quality used for thumbnails
pub const THUMB_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailService {
    size: u32,
    quality: u8,
}

impl Default for ThumbnailService {
    fn default() -> Self {
        Self {
            size: THUMB_SIZE,
            quality: THUMB_QUALITY,
        }
    }
}

impl ThumbnailService {
    pub fn new(size: u32, quality: u8) -> Self {
        Self { size, quality }
    }

    /// Decodes `data` and produces a center-cropped square JPEG thumbnail.
    ///
    /// Decoding and resampling are CPU bound, so the work runs on the blocking pool.
    pub async fn generate(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let service = *self;
        tokio::task::spawn_blocking(move || service.generate_blocking(&data))
            .await
            .map_err(|e| anyhow!("Thumbnail task failed: {}", e))?
    }

    pub fn generate_blocking(&self, data: &[u8]) -> Result<Vec<u8>> {
        let img =
            image::load_from_memory(data).map_err(|e| anyhow!("Failed to load image: {}", e))?;

        // Scale to cover the square, then crop the overflow evenly from both sides
        let cropped = img.resize_to_fill(self.size, self.size, FilterType::Lanczos3);

        Self::encode_to_jpeg(&cropped, self.quality)
    }

    fn encode_to_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // JPEG has no alpha channel and no 16-bit support; flatten to 8-bit RGB.
        let rgb = img.to_rgb8();

        let mut out_data = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out_data, quality);
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| anyhow!("Failed to encode JPEG thumbnail: {}", e))?;
        }
        Ok(out_data)
    }
}
