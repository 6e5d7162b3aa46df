//! Mask-based frame compositing.
//!
//! The cloak effect itself: masked pixels come from the background
//! snapshot, everything else from the live frame.

use crate::camera::Frame;
use crate::mask::{Mask, MASK_OFF};

/// Composite the background and live frame under a mask.
///
/// For every pixel: background where the mask is on, live frame where it
/// is off. The three inputs must share identical dimensions; a mismatch
/// is a programming error and panics.
pub fn composite(background: &Frame, live: &Frame, mask: &Mask) -> Frame {
    let mut out = live.clone();
    composite_into(background, live, mask, &mut out.data);
    out
}

/// Allocation-free variant of [`composite`] writing into an existing
/// RGB buffer, which is resized to fit.
pub fn composite_into(background: &Frame, live: &Frame, mask: &Mask, out: &mut Vec<u8>) {
    assert_eq!(
        (background.width, background.height),
        (live.width, live.height),
        "background and live frame dimensions must match"
    );
    assert_eq!(
        (mask.width, mask.height),
        (live.width, live.height),
        "mask and frame dimensions must match"
    );

    out.clear();
    out.reserve(live.data.len());

    for ((bg, lv), &m) in background
        .data
        .chunks_exact(3)
        .zip(live.data.chunks_exact(3))
        .zip(mask.data.iter())
    {
        let src = if m != MASK_OFF { bg } else { lv };
        out.extend_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FrameFormat;
    use crate::mask::MASK_ON;
    use std::time::Instant;

    fn make_frame(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    fn solid(r: u8, g: u8, b: u8, w: u32, h: u32) -> Frame {
        let mut data = Vec::new();
        for _ in 0..w * h {
            data.extend_from_slice(&[r, g, b]);
        }
        make_frame(data, w, h)
    }

    #[test]
    fn test_composite_all_off_mask_is_live() {
        let bg = solid(10, 20, 30, 4, 3);
        let live = solid(200, 100, 50, 4, 3);
        let mask = Mask::new(4, 3);
        let out = composite(&bg, &live, &mask);
        assert_eq!(out.data, live.data);
    }

    #[test]
    fn test_composite_all_on_mask_is_background() {
        let bg = solid(10, 20, 30, 4, 3);
        let live = solid(200, 100, 50, 4, 3);
        let mut mask = Mask::new(4, 3);
        mask.data.fill(MASK_ON);
        let out = composite(&bg, &live, &mask);
        assert_eq!(out.data, bg.data);
    }

    #[test]
    fn test_composite_mixed_mask_selects_per_pixel() {
        let bg = solid(1, 1, 1, 2, 1);
        let live = solid(9, 9, 9, 2, 1);
        let mut mask = Mask::new(2, 1);
        mask.data[0] = MASK_ON;
        let out = composite(&bg, &live, &mask);
        assert_eq!(out.data, vec![1, 1, 1, 9, 9, 9]);
    }

    #[test]
    #[should_panic(expected = "dimensions must match")]
    fn test_composite_frame_dimension_mismatch_panics() {
        let bg = solid(0, 0, 0, 3, 3);
        let live = solid(0, 0, 0, 4, 3);
        let mask = Mask::new(4, 3);
        let _ = composite(&bg, &live, &mask);
    }

    #[test]
    #[should_panic(expected = "dimensions must match")]
    fn test_composite_mask_dimension_mismatch_panics() {
        let bg = solid(0, 0, 0, 4, 3);
        let live = solid(0, 0, 0, 4, 3);
        let mask = Mask::new(3, 3);
        let _ = composite(&bg, &live, &mask);
    }
}
