use crate::error::{DecodeError, PipelineError};
use crate::tools::frame::{Frame, FrameSequence, FrameSource};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 直接解碼多影格 GIF
///
/// 每張影格都已依處置方式合成到完整畫布上
#[derive(Debug, Clone, Copy, Default)]
pub struct GifFrameSource;

impl FrameSource for GifFrameSource {
    fn extract(&self, resource: &Path) -> Result<FrameSequence, PipelineError> {
        let file = File::open(resource).map_err(|e| PipelineError::io(resource, e))?;

        let decoder = GifDecoder::new(BufReader::new(file))
            .map_err(|e| DecodeError::Malformed(format!("{}: {e}", resource.display())))?;

        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| DecodeError::Malformed(format!("{}: {e}", resource.display())))?;

        debug!("GIF 解碼完成: {} ({} 張影格)", resource.display(), frames.len());

        Ok(FrameSequence::new(
            frames
                .into_iter()
                .map(|frame| Frame::from(image::DynamicImage::ImageRgba8(frame.into_buffer())))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Rgb, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_gif(path: &Path, colors: &[[u8; 3]]) {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frames = colors.iter().map(|&[r, g, b]| {
                image::Frame::new(RgbaImage::from_pixel(8, 6, Rgba([r, g, b, 255])))
            });
            encoder.encode_frames(frames).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_decode_all_frames_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("anim.gif");
        write_gif(&path, &[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);

        let seq = GifFrameSource.extract(&path).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!((seq.frame_width(), seq.frame_height()), (8, 6));

        let Rgb([r, g, b]) = seq.frames()[0].pixel(4, 3);
        assert!(r > 200 && g < 50 && b < 50);
        let Rgb([r, g, b]) = seq.frames()[2].pixel(4, 3);
        assert!(b > 200 && r < 50 && g < 50);
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.gif");
        fs::write(&path, b"<html>not found</html>").unwrap();

        let err = GifFrameSource.extract(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = GifFrameSource
            .extract(&temp_dir.path().join("missing.gif"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
