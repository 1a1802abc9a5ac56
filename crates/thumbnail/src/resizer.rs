use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use crate::error::ThumbnailError;

/// Turns original image bytes into a square JPEG thumbnail.
#[async_trait]
pub trait Resizer: Send + Sync {
    /// Produce a `size`×`size` JPEG from `source`.
    async fn resize(&self, source: Bytes, size: u32) -> Result<Bytes, ThumbnailError>;
}

/// [`Resizer`] built on the `image` crate.
///
/// The source is scaled to cover the square and center-cropped, transparent
/// pixels are composited onto white, and the result is JPEG-encoded. The work
/// runs on the blocking thread pool.
#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    quality: u8,
    filter: FilterType,
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self {
            quality: 80,
            filter: FilterType::Triangle,
        }
    }
}

impl ImageResizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the JPEG quality (1-100).
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    fn render(source: &[u8], size: u32, quality: u8, filter: FilterType) -> Result<Bytes, ThumbnailError> {
        let decoded =
            image::load_from_memory(source).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
        let rgba = decoded.resize_to_fill(size, size, filter).to_rgba8();

        let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
        });

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&flattened)
            .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
        Ok(Bytes::from(out))
    }
}

/// Composite one channel over a white background.
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u32::from(channel), u32::from(alpha));
    let blended = (c * a + 255 * (255 - a) + 127) / 255;
    u8::try_from(blended).unwrap_or(u8::MAX)
}

#[async_trait]
impl Resizer for ImageResizer {
    async fn resize(&self, source: Bytes, size: u32) -> Result<Bytes, ThumbnailError> {
        let Self { quality, filter } = *self;
        tokio::task::spawn_blocking(move || Self::render(&source, size, quality, filter))
            .await
            .map_err(|e| ThumbnailError::Task(e.to_string()))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;

    /// Encode a solid-color PNG of the given dimensions.
    pub(crate) fn png(width: u32, height: u32, color: [u8; 4]) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn blending_over_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(200, 255), 200);
        assert_eq!(over_white(0, 128), 127);
    }

    #[tokio::test]
    async fn produces_square_jpeg() {
        let source = png(300, 150, [10, 20, 30, 255]);
        let out = ImageResizer::new().resize(source, 64).await.unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn transparency_becomes_white() {
        let source = png(32, 32, [0, 0, 0, 0]);
        let out = ImageResizer::new().resize(source, 16).await.unwrap();

        let decoded = image::load_from_memory(&out).unwrap().to_rgb8();
        let Rgb([r, g, b]) = *decoded.get_pixel(8, 8);
        assert!(r > 245 && g > 245 && b > 245, "expected white, got {r},{g},{b}");
    }

    #[tokio::test]
    async fn non_image_is_a_decode_error() {
        let err = ImageResizer::new()
            .resize(Bytes::from_static(b"plain text, not pixels"), 64)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode(_)));
    }
}
