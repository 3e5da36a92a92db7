use crate::error::EncodeError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use log::warn;

/// 拼接圖編碼器
pub trait TileCodec: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, canvas: &RgbImage) -> Result<Vec<u8>, EncodeError>;
}

/// 有損壓縮（JPEG），品質 1-100
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl TileCodec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn encode(&self, canvas: &RgbImage) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode_image(canvas)
            .map_err(|e| EncodeError::CompressionFailed {
                codec: self.name(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

/// 無損壓縮（PNG），有損壓縮失敗時的備援
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl TileCodec for PngCodec {
    fn name(&self) -> &'static str {
        "png"
    }

    fn encode(&self, canvas: &RgbImage) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                canvas.as_raw(),
                canvas.width(),
                canvas.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| EncodeError::CompressionFailed {
                codec: self.name(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

/// 先以主要編碼器壓縮，失敗時記錄並改用備援編碼器
pub fn encode_with_fallback(
    canvas: &RgbImage,
    primary: &dyn TileCodec,
    fallback: &dyn TileCodec,
) -> Result<Vec<u8>, EncodeError> {
    match primary.encode(canvas) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!("{e}，改用 {} 編碼", fallback.name());
            fallback.encode(canvas)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    struct FailingCodec;

    impl TileCodec for FailingCodec {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn encode(&self, _canvas: &RgbImage) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError::CompressionFailed {
                codec: self.name(),
                reason: "boom".to_string(),
            })
        }
    }

    fn checker(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([10, 10, 10])
            }
        })
    }

    #[test]
    fn test_jpeg_output_is_jpeg() {
        let bytes = JpegCodec::new(80).encode(&checker(16, 16)).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_quality_affects_size() {
        let canvas = checker(64, 64);
        let low = JpegCodec::new(5).encode(&canvas).unwrap();
        let high = JpegCodec::new(100).encode(&canvas).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_fallback_is_lossless() {
        let canvas = checker(12, 8);
        let bytes = encode_with_fallback(&canvas, &FailingCodec, &PngCodec).unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, canvas);
    }

    #[test]
    fn test_both_codecs_failing_is_error() {
        let err = encode_with_fallback(&checker(4, 4), &FailingCodec, &FailingCodec).unwrap_err();
        assert!(matches!(err, EncodeError::CompressionFailed { .. }));
    }
}
