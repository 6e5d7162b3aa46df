//! Background snapshot capture.
//!
//! The cloak effect needs a static picture of the scene without the
//! subject in it. Capture blocks: it waits a settle delay, drains a fixed
//! number of frames from the camera keeping only the last, and mirrors
//! the result so later (also mirrored) live frames align with it.

use std::io::Write;
use std::thread;
use std::time::Duration;

use crate::camera::{mirror_horizontal, CameraCapture, CameraError, Frame};

/// Parameters for background snapshot capture.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundSettings {
    /// Delay before reading, giving the user time to step out of frame.
    pub settle_delay: Duration,
    /// Number of consecutive frames to read. Only the last is kept; the
    /// earlier reads flush stale buffered frames out of the capture
    /// pipeline (buffering cameras would otherwise hand back an old
    /// frame with the user still in it).
    pub frames: u32,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            frames: 30,
        }
    }
}

/// Capture a fresh background snapshot, blocking.
///
/// Re-invocable at any time during a session (user-triggered reset). Any
/// failed read is fatal: the caller must release the camera and end the
/// session rather than retry.
pub fn capture_background(
    camera: &mut CameraCapture,
    settings: &BackgroundSettings,
) -> Result<Frame, CameraError> {
    eprintln!("Capturing background... stay out of frame!");
    thread::sleep(settings.settle_delay);

    let mut snapshot = None;
    for i in 0..settings.frames {
        let frame = camera.read_frame()?;
        snapshot = Some(frame);
        eprint!("  Progress: {}/{}\r", i + 1, settings.frames);
        let _ = std::io::stderr().flush();
    }
    eprintln!();

    // frames >= 1 is enforced by config validation; read_frame bubbles
    // any failure before we get here
    let mut background = snapshot
        .ok_or_else(|| CameraError::CaptureFailed("no frames read for background".to_string()))?;

    mirror_horizontal(&mut background);
    log::info!(
        "background captured at {}x{}",
        background.width,
        background.height
    );
    eprintln!("Background captured. Now put on your cloak!");

    Ok(background)
}
