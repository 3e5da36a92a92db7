//! 使用 ffmpeg 子程序擷取影片影格
//!
//! ffmpeg 以指定取樣率把每張影格編成 PNG 並連續寫到 stdout，
//! 這裡依 PNG chunk 結構切出每張影格再個別解碼

use crate::error::{DecodeError, PipelineError, ProcessError};
use crate::tools::frame::{Frame, FrameSequence, FrameSource};
use image::ImageFormat;
use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// 單一 chunk 長度上限，避免異常串流要求過大的緩衝區
const MAX_CHUNK_LENGTH: u32 = 64 * 1024 * 1024;

/// 建立 ffmpeg 影格擷取命令
pub struct FfmpegFrameCommand {
    program: String,
    source_path: PathBuf,
    rate: f64,
}

impl FfmpegFrameCommand {
    #[must_use]
    pub fn new(program: &str, source_path: &Path, rate: f64) -> Self {
        Self {
            program: program.to_string(),
            source_path: source_path.to_path_buf(),
            rate,
        }
    }

    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            self.source_path.to_string_lossy().to_string(),
            "-r".to_string(),
            format!("{:.2}", self.rate),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-codec:v".to_string(),
            "png".to_string(),
            "-".to_string(),
        ]
    }

    #[must_use]
    pub fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// 從連續的 PNG 串流逐張切出完整影格
pub struct PngStreamReader<R> {
    reader: R,
    frames_read: usize,
}

impl<R: Read> PngStreamReader<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            frames_read: 0,
        }
    }

    /// 讀取下一張影格的完整 PNG 位元組
    ///
    /// 在影格邊界遇到串流結束回傳 `Ok(None)`；影格讀到一半結束則是 `TruncatedFrame`
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
        let index = self.frames_read;
        let mut signature = [0u8; 8];

        match read_full(&mut self.reader, &mut signature).map_err(|e| io_malformed(&e))? {
            0 => return Ok(None),
            8 => {}
            _ => return Err(DecodeError::TruncatedFrame { index }),
        }

        if signature != PNG_SIGNATURE {
            return Err(DecodeError::Malformed(format!(
                "影格 {index} 不是 PNG 格式"
            )));
        }

        let mut png = signature.to_vec();
        loop {
            let mut header = [0u8; 8];
            if read_full(&mut self.reader, &mut header).map_err(|e| io_malformed(&e))? != 8 {
                return Err(DecodeError::TruncatedFrame { index });
            }

            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            if length > MAX_CHUNK_LENGTH {
                return Err(DecodeError::Malformed(format!(
                    "影格 {index} 的 chunk 長度無效: {length}"
                )));
            }
            let chunk_type = [header[4], header[5], header[6], header[7]];
            png.extend_from_slice(&header);

            // chunk 資料加上 4 bytes CRC
            let body_len = length as usize + 4;
            let start = png.len();
            png.resize(start + body_len, 0);
            if read_full(&mut self.reader, &mut png[start..]).map_err(|e| io_malformed(&e))?
                != body_len
            {
                return Err(DecodeError::TruncatedFrame { index });
            }

            if &chunk_type == b"IEND" {
                break;
            }
        }

        self.frames_read += 1;
        Ok(Some(png))
    }

    #[must_use]
    pub const fn frames_read(&self) -> usize {
        self.frames_read
    }
}

/// 盡量填滿 `buf`，回傳實際讀到的位元組數（串流結束時小於 `buf.len()`）
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn io_malformed(err: &io::Error) -> DecodeError {
    DecodeError::Malformed(format!("讀取影格串流失敗: {err}"))
}

/// 解碼串流中的所有影格，最多 `max_frames` 張
///
/// 回傳影格與是否因達到上限而提前停止
pub fn read_png_frames(
    reader: impl Read,
    max_frames: usize,
    shutdown_signal: &AtomicBool,
) -> Result<(Vec<Frame>, bool), PipelineError> {
    let mut stream = PngStreamReader::new(reader);
    let mut frames = Vec::new();

    while frames.len() < max_frames {
        if shutdown_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }

        let Some(png) = stream.next_frame()? else {
            return Ok((frames, false));
        };
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(DecodeError::from)?;
        frames.push(Frame::from(image));
    }

    Ok((frames, true))
}

/// 透過 ffmpeg 擷取影片影格
pub struct FfmpegFrameSource {
    program: String,
    rate: f64,
    max_frames: usize,
    shutdown_signal: Arc<AtomicBool>,
}

impl FfmpegFrameSource {
    #[must_use]
    pub fn new(
        program: &str,
        rate: f64,
        max_frames: usize,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            program: program.to_string(),
            rate,
            max_frames,
            shutdown_signal,
        }
    }

    fn finish(
        &self,
        mut child: Child,
        stderr_reader: Option<thread::JoinHandle<String>>,
        stopped_early: bool,
    ) -> Result<(), ProcessError> {
        if stopped_early {
            // 已達上限或被取消，剩下的輸出不需要
            let _ = child.kill();
        }

        let status = child.wait().map_err(|source| ProcessError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if stopped_early || status.success() {
            if !stderr.is_empty() {
                debug!("ffmpeg stderr: {stderr}");
            }
            return Ok(());
        }

        Err(ProcessError::NonTerminalFailure {
            program: self.program.clone(),
            status: status.to_string(),
            stderr,
        })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn extract(&self, resource: &Path) -> Result<FrameSequence, PipelineError> {
        let command = FfmpegFrameCommand::new(&self.program, resource, self.rate);
        debug!("執行: {} {}", self.program, command.args().join(" "));

        let mut child = command
            .build_command()
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        // stderr 另開執行緒讀取，避免緩衝區滿時 ffmpeg 卡住
        let stderr_reader = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                BufReader::new(stderr)
                    .lines()
                    .map_while(Result::ok)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        });

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PipelineError::from(ProcessError::NonTerminalFailure {
                program: self.program.clone(),
                status: "無法取得 stdout".to_string(),
                stderr: String::new(),
            }));
        };

        let result = read_png_frames(
            BufReader::new(stdout),
            self.max_frames,
            &self.shutdown_signal,
        );

        match result {
            Ok((frames, capped)) => {
                if capped {
                    warn!(
                        "影格數達到上限 {}，停止讀取: {}",
                        self.max_frames,
                        resource.display()
                    );
                }
                self.finish(child, stderr_reader, capped)?;
                info!("影片擷取完成: {} ({} 張影格)", resource.display(), frames.len());
                Ok(FrameSequence::new(frames))
            }
            Err(e) => {
                // 解碼失敗時仍要回收子程序
                let _ = self.finish(child, stderr_reader, true);
                Err(e)
            }
        }
    }
}
