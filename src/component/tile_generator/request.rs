use crate::error::PipelineError;
use crate::tools::SourceDescriptor;

pub const DEFAULT_WIDTH: u32 = 2048;
/// 寬度不大於此值時改用預設寬度
pub const MIN_WIDTH: u32 = 1000;
pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_FPS: f64 = 1.0;

/// 前端傳入的原始參數（皆為字串，可能缺少）
#[derive(Debug, Clone, Default)]
pub struct RawTileParams {
    pub src: String,
    pub width: Option<String>,
    pub quality: Option<String>,
    pub fps: Option<String>,
    pub refresh: Option<String>,
    pub preheat: Option<String>,
}

/// 正規化後的分鏡請求
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub source: SourceDescriptor,
    pub width: u32,
    pub quality: u8,
    pub fps: f64,
    pub refresh: bool,
    pub preheat: bool,
}

impl TileRequest {
    /// 使用預設參數建立請求
    pub fn new(src: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            source: SourceDescriptor::parse(src)?,
            width: DEFAULT_WIDTH,
            quality: DEFAULT_QUALITY,
            fps: DEFAULT_FPS,
            refresh: false,
            preheat: false,
        })
    }

    /// 解析前端參數，無效的數值套用預設值
    ///
    /// 來源網址在這裡就會驗證，不符合的請求不會連線
    pub fn from_raw(raw: &RawTileParams) -> Result<Self, PipelineError> {
        Ok(Self {
            source: SourceDescriptor::parse(&raw.src)?,
            width: parse_width(raw.width.as_deref()),
            quality: parse_quality(raw.quality.as_deref()),
            fps: parse_fps(raw.fps.as_deref()),
            refresh: is_flag_set(raw.refresh.as_deref()),
            preheat: is_flag_set(raw.preheat.as_deref()),
        })
    }

    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub const fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    #[must_use]
    pub const fn with_preheat(mut self, preheat: bool) -> Self {
        self.preheat = preheat;
        self
    }
}

fn parse_width(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&w| w > MIN_WIDTH)
        .unwrap_or(DEFAULT_WIDTH)
}

fn parse_quality(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|q| (1..=100).contains(q))
        .unwrap_or(DEFAULT_QUALITY)
}

fn parse_fps(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|&f| f.is_finite() && f > 0.0)
        .unwrap_or(DEFAULT_FPS)
}

fn is_flag_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SourceKind;

    fn raw(src: &str) -> RawTileParams {
        RawTileParams {
            src: src.to_string(),
            ..RawTileParams::default()
        }
    }

    #[test]
    fn test_defaults() {
        let request = TileRequest::from_raw(&raw("https://example.com/a.gif")).unwrap();
        assert_eq!(request.width, DEFAULT_WIDTH);
        assert_eq!(request.quality, DEFAULT_QUALITY);
        assert!((request.fps - DEFAULT_FPS).abs() < f64::EPSILON);
        assert!(!request.refresh && !request.preheat);
        assert_eq!(request.source.kind, SourceKind::Gif);
    }

    #[test]
    fn test_valid_values() {
        let request = TileRequest::from_raw(&RawTileParams {
            width: Some("3000".to_string()),
            quality: Some("55".to_string()),
            fps: Some("2.5".to_string()),
            refresh: Some("1".to_string()),
            preheat: Some("1".to_string()),
            ..raw("https://example.com/a.mp4")
        })
        .unwrap();

        assert_eq!(request.width, 3000);
        assert_eq!(request.quality, 55);
        assert!((request.fps - 2.5).abs() < f64::EPSILON);
        assert!(request.refresh && request.preheat);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        assert_eq!(parse_width(Some("1000")), DEFAULT_WIDTH);
        assert_eq!(parse_width(Some("abc")), DEFAULT_WIDTH);
        assert_eq!(parse_width(Some("1001")), 1001);
        assert_eq!(parse_quality(Some("0")), DEFAULT_QUALITY);
        assert_eq!(parse_quality(Some("101")), DEFAULT_QUALITY);
        assert_eq!(parse_quality(Some("-5")), DEFAULT_QUALITY);
        assert_eq!(parse_quality(Some("100")), 100);
        assert!((parse_fps(Some("0")) - DEFAULT_FPS).abs() < f64::EPSILON);
        assert!((parse_fps(Some("NaN")) - DEFAULT_FPS).abs() < f64::EPSILON);
        assert!(!is_flag_set(Some("true")));
        assert!(!is_flag_set(None));
    }

    #[test]
    fn test_unsupported_source_rejected() {
        let err = TileRequest::from_raw(&raw("https://example.com/a.webm")).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSource(_)));
    }
}
