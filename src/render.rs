//! Terminal preview rendering.
//!
//! The composited feed is shown directly in the terminal: each character
//! cell displays two vertically stacked pixels using the upper-half-block
//! glyph with 24-bit foreground and background colors. An optional debug
//! panel in the top-right corner shows the raw binary mask, and the last
//! row carries the status line.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::camera::Frame;
use crate::mask::Mask;

/// Upper half block: foreground paints the top pixel, background the bottom.
const HALF_BLOCK: char = '\u{2580}';

/// RGB color of one preview cell pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbCell {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Static flag to track if raw mode is active (for panic handler)
static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Guard that ensures the terminal is restored to normal mode on drop.
/// This handles both normal exits and panics.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        install_panic_hook();
        enable_raw_mode()?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        RAW_MODE_ACTIVE.store(false, Ordering::SeqCst);
        // Best-effort cleanup - ignore errors during drop
        let _ = disable_raw_mode();
    }
}

/// Install a panic hook that restores terminal state before panicking.
/// This ensures the terminal is usable even if the app panics.
fn install_panic_hook() {
    static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        if RAW_MODE_ACTIVE.load(Ordering::SeqCst) {
            let _ = crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen);
            let _ = disable_raw_mode();
            RAW_MODE_ACTIVE.store(false, Ordering::SeqCst);
        }
        original_hook(panic_info);
    }));
}

/// Live preview surface on the controlling terminal.
///
/// Entering the preview switches to the alternate screen in raw mode and
/// hides the cursor; everything is restored when the preview is dropped.
pub struct TerminalPreview {
    _raw: RawModeGuard,
    out: io::Stdout,
    cells: Vec<RgbCell>,
    mask_cells: Vec<RgbCell>,
}

impl TerminalPreview {
    pub fn new() -> io::Result<Self> {
        let raw = RawModeGuard::enter()?;
        let mut out = io::stdout();
        crossterm::execute!(
            out,
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide
        )?;
        Ok(Self {
            _raw: raw,
            out,
            cells: Vec::new(),
            mask_cells: Vec::new(),
        })
    }

    /// Paint one composited frame, optionally with the mask debug panel.
    pub fn render(
        &mut self,
        frame: &Frame,
        debug_mask: Option<&Mask>,
        color_name: &str,
        recording: bool,
    ) -> io::Result<()> {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        if cols == 0 || rows < 2 {
            return Ok(());
        }

        // Last row is reserved for the status line
        let view_rows = rows - 1;
        downsample_rgb_into(
            &frame.data,
            frame.width,
            frame.height,
            cols,
            view_rows * 2,
            &mut self.cells,
        );

        let mut output = String::with_capacity(self.cells.len() * 24);
        output.push_str("\x1b[H"); // Home
        paint_half_blocks(&self.cells, cols, view_rows, &mut output);

        if let Some(mask) = debug_mask {
            let panel_cols = cols / 4;
            let panel_rows = view_rows / 4;
            if panel_cols > 0 && panel_rows > 0 {
                downsample_mask_into(mask, panel_cols, panel_rows * 2, &mut self.mask_cells);
                paint_panel(
                    &self.mask_cells,
                    panel_cols,
                    panel_rows,
                    cols - panel_cols,
                    &mut output,
                );
            }
        }

        // Status line
        output.push_str(&format!("\x1b[{};1H", rows));
        output.push_str(&status_line(color_name, recording, cols));

        self.out.write_all(output.as_bytes())?;
        self.out.flush()
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            self.out,
            crossterm::cursor::Show,
            crossterm::terminal::LeaveAlternateScreen
        );
    }
}

/// Area-average an RGB buffer down to a cell grid.
pub fn downsample_rgb_into(
    data: &[u8],
    img_width: u32,
    img_height: u32,
    cell_cols: u16,
    cell_rows: u16,
    buffer: &mut Vec<RgbCell>,
) -> usize {
    buffer.clear();

    if cell_cols == 0 || cell_rows == 0 || img_width == 0 || img_height == 0 || data.is_empty() {
        return 0;
    }

    let output_size = (cell_cols as usize) * (cell_rows as usize);
    buffer.reserve(output_size);

    let cell_w = img_width as f32 / cell_cols as f32;
    let cell_h = img_height as f32 / cell_rows as f32;

    for cy in 0..cell_rows {
        for cx in 0..cell_cols {
            let start_x = (cx as f32 * cell_w) as u32;
            let end_x = ((cx + 1) as f32 * cell_w) as u32;
            let start_y = (cy as f32 * cell_h) as u32;
            let end_y = ((cy + 1) as f32 * cell_h) as u32;

            let mut sum_r = 0u32;
            let mut sum_g = 0u32;
            let mut sum_b = 0u32;
            let mut count = 0u32;

            for py in start_y..end_y {
                for px in start_x..end_x {
                    let idx = ((py * img_width + px) * 3) as usize;
                    if idx + 2 < data.len() {
                        sum_r += data[idx] as u32;
                        sum_g += data[idx + 1] as u32;
                        sum_b += data[idx + 2] as u32;
                        count += 1;
                    }
                }
            }

            buffer.push(if count > 0 {
                RgbCell {
                    r: (sum_r / count) as u8,
                    g: (sum_g / count) as u8,
                    b: (sum_b / count) as u8,
                }
            } else {
                RgbCell::default()
            });
        }
    }

    output_size
}

/// Area-average a mask down to grayscale cells.
pub fn downsample_mask_into(
    mask: &Mask,
    cell_cols: u16,
    cell_rows: u16,
    buffer: &mut Vec<RgbCell>,
) -> usize {
    buffer.clear();

    if cell_cols == 0 || cell_rows == 0 || mask.width == 0 || mask.height == 0 {
        return 0;
    }

    let output_size = (cell_cols as usize) * (cell_rows as usize);
    buffer.reserve(output_size);

    let cell_w = mask.width as f32 / cell_cols as f32;
    let cell_h = mask.height as f32 / cell_rows as f32;

    for cy in 0..cell_rows {
        for cx in 0..cell_cols {
            let start_x = (cx as f32 * cell_w) as u32;
            let end_x = ((cx + 1) as f32 * cell_w) as u32;
            let start_y = (cy as f32 * cell_h) as u32;
            let end_y = ((cy + 1) as f32 * cell_h) as u32;

            let mut sum = 0u32;
            let mut count = 0u32;
            for py in start_y..end_y {
                for px in start_x..end_x {
                    let idx = (py * mask.width + px) as usize;
                    if idx < mask.data.len() {
                        sum += mask.data[idx] as u32;
                        count += 1;
                    }
                }
            }

            let v = if count > 0 { (sum / count) as u8 } else { 0 };
            buffer.push(RgbCell { r: v, g: v, b: v });
        }
    }

    output_size
}

/// Append half-block rows for a full-width cell grid.
///
/// `cells` holds `cols * rows * 2` entries; each output row consumes two
/// cell rows (upper pixel as foreground, lower as background).
fn paint_half_blocks(cells: &[RgbCell], cols: u16, rows: u16, output: &mut String) {
    for y in 0..rows {
        for x in 0..cols {
            let top = cells
                .get((y as usize * 2) * cols as usize + x as usize)
                .copied()
                .unwrap_or_default();
            let bottom = cells
                .get((y as usize * 2 + 1) * cols as usize + x as usize)
                .copied()
                .unwrap_or_default();
            output.push_str(&format!(
                "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{}",
                top.r, top.g, top.b, bottom.r, bottom.g, bottom.b, HALF_BLOCK
            ));
        }
        output.push_str("\x1b[0m\r\n");
    }
}

/// Append a half-block panel at a fixed column offset (row origin 1).
fn paint_panel(cells: &[RgbCell], cols: u16, rows: u16, at_col: u16, output: &mut String) {
    for y in 0..rows {
        output.push_str(&format!("\x1b[{};{}H", y + 1, at_col + 1));
        for x in 0..cols {
            let top = cells
                .get((y as usize * 2) * cols as usize + x as usize)
                .copied()
                .unwrap_or_default();
            let bottom = cells
                .get((y as usize * 2 + 1) * cols as usize + x as usize)
                .copied()
                .unwrap_or_default();
            output.push_str(&format!(
                "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{}",
                top.r, top.g, top.b, bottom.r, bottom.g, bottom.b, HALF_BLOCK
            ));
        }
        output.push_str("\x1b[0m");
    }
}

/// Build the status line, padded or truncated to the terminal width.
pub fn status_line(color_name: &str, recording: bool, cols: u16) -> String {
    let mut text = format!(
        " Cloak: {} | q quit  r reset bg  space mask",
        color_name.to_uppercase()
    );
    if recording {
        text.push_str("  [REC]");
    }

    let width = cols as usize;
    if text.len() > width {
        text.truncate(width);
    } else {
        text.push_str(&" ".repeat(width - text.len()));
    }

    if recording {
        // Highlight the REC tag in red
        if let Some(pos) = text.find("[REC]") {
            let (head, tail) = text.split_at(pos);
            return format!("\x1b[7m{}\x1b[31m{}\x1b[0m", head, tail);
        }
    }
    format!("\x1b[7m{}\x1b[0m", text)
}
