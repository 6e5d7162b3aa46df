//! Video recording sink backed by an FFmpeg child process.
//!
//! Composited frames are piped as raw RGB to FFmpeg's stdin, one encoded
//! frame per processed loop iteration. Frames the loop never produced are
//! never re-inserted, so recorded playback drifts if processing falls
//! behind the nominal rate.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::camera::Frame;

/// Errors that can occur while recording.
#[derive(Debug)]
pub enum RecorderError {
    /// FFmpeg executable not found
    FfmpegNotFound,
    /// Failed to spawn FFmpeg process
    SpawnFailed(std::io::Error),
    /// FFmpeg process exited with non-zero status
    EncodeFailed { exit_code: Option<i32> },
    /// I/O error while writing frames
    IoError(std::io::Error),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::FfmpegNotFound => {
                write!(
                    f,
                    "FFmpeg not found. Install it with your package manager (e.g. 'apt install ffmpeg' or 'brew install ffmpeg')"
                )
            }
            RecorderError::SpawnFailed(e) => write!(f, "Failed to spawn FFmpeg: {}", e),
            RecorderError::EncodeFailed { exit_code } => {
                write!(f, "FFmpeg exited with code {:?}", exit_code)
            }
            RecorderError::IoError(e) => write!(f, "I/O error while recording: {}", e),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecorderError::FfmpegNotFound
        } else {
            RecorderError::IoError(e)
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Nominal frame rate stamped on the output stream.
    pub fps: u32,
    /// FFmpeg video codec name.
    pub codec: String,
    /// Output container extension.
    pub container: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            fps: 20,
            codec: "mpeg4".to_string(),
            container: "avi".to_string(),
        }
    }
}

/// Timestamped output filename, e.g. `invisibility_cloak_20260806_142501.avi`.
pub fn output_filename(settings: &RecorderSettings) -> String {
    format!(
        "invisibility_cloak_{}.{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        settings.container
    )
}

/// FFmpeg arguments for encoding raw RGB frames from stdin.
pub fn build_ffmpeg_args(
    width: u32,
    height: u32,
    settings: &RecorderSettings,
    output: &str,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        "rgb24".to_string(),
        "-video_size".to_string(),
        format!("{}x{}", width, height),
        "-framerate".to_string(),
        settings.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        settings.codec.clone(),
        "-q:v".to_string(),
        "5".to_string(),
        output.to_string(),
    ]
}

/// A running recording sink.
///
/// Owned exclusively by the session loop. Dropping the recorder closes
/// FFmpeg's stdin (end of stream) and waits for it to finish encoding.
pub struct Recorder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_thread: Option<JoinHandle<()>>,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl Recorder {
    /// Spawn FFmpeg and start a recording of the given frame dimensions.
    pub fn start(
        width: u32,
        height: u32,
        settings: &RecorderSettings,
    ) -> Result<Self, RecorderError> {
        let filename = output_filename(settings);
        let args = build_ffmpeg_args(width, height, settings, &filename);

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecorderError::FfmpegNotFound
                } else {
                    RecorderError::SpawnFailed(e)
                }
            })?;

        let stdin = child.stdin.take();

        // Drain stderr so FFmpeg never blocks on a full pipe
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    log::debug!("[ffmpeg] {}", line);
                }
            })
        });

        log::info!("recording to {}", filename);

        Ok(Self {
            child,
            stdin,
            stderr_thread,
            path: PathBuf::from(filename),
            width,
            height,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one frame to the recording.
    ///
    /// The frame must match the dimensions the recorder was started with;
    /// a mismatch is a programming error.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        assert_eq!(
            (frame.width, frame.height),
            (self.width, self.height),
            "recorded frame dimensions must match the recorder"
        );

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecorderError::IoError(std::io::Error::other("recorder finished")))?;
        stdin.write_all(&frame.data)?;
        Ok(())
    }

    /// Close the stream and wait for FFmpeg to finish the file.
    pub fn finish(mut self) -> Result<PathBuf, RecorderError> {
        // Closing stdin signals end of the raw stream; FFmpeg then
        // finalizes the container and exits on its own
        drop(self.stdin.take());

        let status = self.child.wait().map_err(RecorderError::IoError)?;
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }

        if !status.success() {
            return Err(RecorderError::EncodeFailed {
                exit_code: status.code(),
            });
        }

        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}
