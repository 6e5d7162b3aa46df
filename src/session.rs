//! The interactive cloak session.
//!
//! A single synchronous loop drives the whole effect: warmup, background
//! capture, then per frame read -> mirror -> mask -> composite -> render
//! -> record, with one key poll per iteration. States move
//! WarmingUp -> CapturingBackground -> Running and, from Running, either
//! back through a background recapture or to Stopped. Every failure after
//! startup is terminal for the session; an in-flight frame always
//! finishes before a quit is honored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use thiserror::Error;

use crate::background::{capture_background, BackgroundSettings};
use crate::camera::{mirror_horizontal, CameraCapture, CameraError, CameraSettings};
use crate::color::ColorProfile;
use crate::compositor::composite;
use crate::mask::{MaskBuilder, MaskSettings};
use crate::recorder::{Recorder, RecorderError, RecorderSettings};
use crate::render::TerminalPreview;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Camera(#[from] CameraError),
    #[error("{0}")]
    Recorder(#[from] RecorderError),
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Everything a session needs, assembled from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub camera: CameraSettings,
    /// Fixed delay after opening the camera, letting auto-exposure settle.
    pub warmup: Duration,
    /// Mirror live frames horizontally (selfie view).
    pub mirror: bool,
    pub background: BackgroundSettings,
    pub mask: MaskSettings,
    pub recorder: RecorderSettings,
    /// Active cloak color.
    pub profile: ColorProfile,
    /// Show the mask debug panel initially.
    pub show_debug: bool,
    /// Record the composited output.
    pub record: bool,
}

/// Mutable per-session state, owned by the loop.
#[derive(Debug)]
struct SessionFlags {
    profile: ColorProfile,
    show_debug: bool,
    recording: bool,
}

/// A user command decoded from one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Quit,
    ResetBackground,
    ToggleDebug,
}

/// Map a key event to a session command, if any.
pub fn map_key(event: KeyEvent) -> Option<KeyCommand> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    // Raw mode delivers Ctrl+C as a key event rather than a signal
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(KeyCommand::Quit),
            _ => None,
        };
    }
    match event.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(KeyCommand::Quit),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(KeyCommand::ResetBackground),
        KeyCode::Char(' ') => Some(KeyCommand::ToggleDebug),
        _ => None,
    }
}

/// Poll for one command, waiting at most `timeout`.
fn poll_command(timeout: Duration) -> std::io::Result<Option<KeyCommand>> {
    if crossterm::event::poll(timeout)? {
        if let Event::Key(key) = crossterm::event::read()? {
            return Ok(map_key(key));
        }
    }
    Ok(None)
}

/// Global flag for handling Ctrl+C across the application
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
    })
}

/// Run a full cloak session, blocking until the user quits or a fatal
/// error ends it. The camera handle and recording sink live entirely
/// within this call.
pub fn run(opts: SessionOptions) -> Result<(), SessionError> {
    let mut camera = CameraCapture::open(opts.camera.clone())?;

    // WarmingUp: fixed sleep, not an adaptive readiness check; slow
    // cameras may need a larger configured warmup
    eprintln!(
        "Camera warming up for {}s...",
        opts.warmup.as_secs_f32().ceil() as u64
    );
    thread::sleep(opts.warmup);

    let mut background = capture_background(&mut camera, &opts.background)?;

    let resolution = camera.actual_resolution();
    let mut recorder = if opts.record {
        let mut settings = opts.recorder.clone();
        // Stamp the output with the camera's nominal rate when it
        // reports one
        if camera.actual_fps() > 0 {
            settings.fps = camera.actual_fps();
        }
        let recorder = Recorder::start(resolution.width, resolution.height, &settings)?;
        eprintln!("Recording to: {}", recorder.path().display());
        Some(recorder)
    } else {
        None
    };

    let mut flags = SessionFlags {
        profile: opts.profile.clone(),
        show_debug: opts.show_debug,
        recording: recorder.is_some(),
    };
    let mut mask_builder = MaskBuilder::new(opts.mask);

    let saved = {
        let mut preview = TerminalPreview::new()?;

        loop {
            let mut live = camera.read_frame()?;
            if opts.mirror {
                mirror_horizontal(&mut live);
            }

            let mask = mask_builder.build(&live, &flags.profile);
            let composited = composite(&background, &live, &mask);

            let debug_mask = flags.show_debug.then_some(&mask);
            preview.render(&composited, debug_mask, &flags.profile.name, flags.recording)?;

            if let Some(rec) = recorder.as_mut() {
                rec.write_frame(&composited)?;
            }

            let command = poll_command(Duration::from_millis(1))?;
            let command = if ctrlc_received() {
                Some(KeyCommand::Quit)
            } else {
                command
            };

            match command {
                Some(KeyCommand::Quit) => break,
                Some(KeyCommand::ResetBackground) => {
                    log::info!("recapturing background");
                    background = capture_background(&mut camera, &opts.background)?;
                }
                Some(KeyCommand::ToggleDebug) => {
                    flags.show_debug = !flags.show_debug;
                    log::debug!("mask debug view: {}", flags.show_debug);
                }
                None => {}
            }
        }

        // The preview drops at the end of this block, restoring the
        // terminal before the final messages are printed
        match recorder.take() {
            Some(rec) => Some(rec.finish()?),
            None => None,
        }
    };

    if let Some(path) = saved {
        eprintln!("Video saved: {}", path.display());
    }

    Ok(())
}
