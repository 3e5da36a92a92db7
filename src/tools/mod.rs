mod downloader;
mod ffmpeg_check;
mod ffmpeg_frames;
mod fingerprint;
mod frame;
mod gif_decoder;
mod grid_layout;
mod path_validator;

pub use downloader::{AcquireOutcome, Fetcher, HttpFetcher, USER_AGENT, acquire};
pub use ffmpeg_check::check_ffmpeg;
pub use ffmpeg_frames::{FfmpegFrameCommand, FfmpegFrameSource, PngStreamReader, read_png_frames};
pub use fingerprint::{Fingerprint, SourceDescriptor, SourceKind, TILE_EXTENSION};
pub use frame::{Frame, FrameSequence, FrameSource};
pub use gif_decoder::GifFrameSource;
pub use grid_layout::GridLayout;
pub use path_validator::{ensure_directory_exists, validate_directory_exists};
