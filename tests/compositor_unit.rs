//! Unit tests for the compositor.
//!
//! These tests verify the per-pixel select semantics:
//! - All-off mask reproduces the live frame exactly
//! - All-on mask reproduces the background exactly
//! - Dimension mismatches are detected, not silently mis-blended
//! - Replacing the background snapshot changes the output iff the new
//!   background differs under the mask

use cloakcam::camera::{Frame, FrameFormat};
use cloakcam::compositor::{composite, composite_into};
use cloakcam::mask::{Mask, MASK_ON};
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

fn solid(rgb: (u8, u8, u8), width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
    }
    make_frame(data, width, height)
}

/// Mask with the given pixel indices switched on.
fn mask_with(width: u32, height: u32, on: &[usize]) -> Mask {
    let mut mask = Mask::new(width, height);
    for &i in on {
        mask.data[i] = MASK_ON;
    }
    mask
}

#[test]
fn test_all_off_mask_yields_live() {
    let bg = solid((1, 2, 3), 8, 6);
    let live = solid((200, 150, 100), 8, 6);
    let mask = Mask::new(8, 6);
    let out = composite(&bg, &live, &mask);
    assert_eq!(out.data, live.data);
    assert_eq!((out.width, out.height), (8, 6));
}

#[test]
fn test_all_on_mask_yields_background() {
    let bg = solid((1, 2, 3), 8, 6);
    let live = solid((200, 150, 100), 8, 6);
    let mut mask = Mask::new(8, 6);
    mask.data.fill(MASK_ON);
    let out = composite(&bg, &live, &mask);
    assert_eq!(out.data, bg.data);
}

#[test]
fn test_partial_mask_selects_per_pixel() {
    let bg = solid((10, 10, 10), 3, 1);
    let live = solid((99, 99, 99), 3, 1);
    let mask = mask_with(3, 1, &[1]);
    let out = composite(&bg, &live, &mask);
    assert_eq!(out.data, vec![99, 99, 99, 10, 10, 10, 99, 99, 99]);
}

#[test]
fn test_composite_into_reuses_buffer() {
    let bg = solid((5, 5, 5), 4, 4);
    let live = solid((50, 50, 50), 4, 4);
    let mask = mask_with(4, 4, &[0, 15]);

    let mut buf = Vec::new();
    composite_into(&bg, &live, &mask, &mut buf);
    assert_eq!(buf.len(), 4 * 4 * 3);
    assert_eq!(&buf[0..3], &[5, 5, 5]);
    assert_eq!(&buf[3..6], &[50, 50, 50]);

    // Second call with a different mask overwrites, not appends
    composite_into(&bg, &live, &Mask::new(4, 4), &mut buf);
    assert_eq!(buf.len(), 4 * 4 * 3);
    assert_eq!(&buf[0..3], &[50, 50, 50]);
}

#[test]
#[should_panic(expected = "dimensions must match")]
fn test_background_dimension_mismatch_detected() {
    let bg = solid((0, 0, 0), 5, 5);
    let live = solid((0, 0, 0), 6, 5);
    let mask = Mask::new(6, 5);
    let _ = composite(&bg, &live, &mask);
}

#[test]
#[should_panic(expected = "dimensions must match")]
fn test_mask_dimension_mismatch_detected() {
    let bg = solid((0, 0, 0), 5, 5);
    let live = solid((0, 0, 0), 5, 5);
    let mask = Mask::new(5, 4);
    let _ = composite(&bg, &live, &mask);
}

// ==================== Background recapture semantics ====================

#[test]
fn test_recapture_with_identical_background_changes_nothing() {
    let bg_old = solid((30, 40, 50), 6, 6);
    let bg_new = solid((30, 40, 50), 6, 6);
    let live = solid((200, 200, 200), 6, 6);
    let mask = mask_with(6, 6, &[0, 7, 14, 21]);

    let before = composite(&bg_old, &live, &mask);
    let after = composite(&bg_new, &live, &mask);
    assert_eq!(before.data, after.data);
}

#[test]
fn test_recapture_changes_output_only_where_backgrounds_differ() {
    let bg_old = solid((30, 40, 50), 6, 6);
    let mut bg_new = solid((30, 40, 50), 6, 6);
    // New background differs at pixel 7 only
    bg_new.data[7 * 3] = 99;
    let live = solid((200, 200, 200), 6, 6);
    let mask = mask_with(6, 6, &[0, 7]);

    let before = composite(&bg_old, &live, &mask);
    let after = composite(&bg_new, &live, &mask);

    // Masked pixel 0: same background on both sides
    assert_eq!(&before.data[0..3], &after.data[0..3]);
    // Masked pixel 7: replaced wholesale by the new snapshot
    assert_ne!(&before.data[7 * 3..7 * 3 + 3], &after.data[7 * 3..7 * 3 + 3]);
    assert_eq!(after.data[7 * 3], 99);
    // Unmasked pixels never change
    assert_eq!(&before.data[3..6], &after.data[3..6]);
}

#[test]
fn test_background_difference_outside_mask_is_invisible() {
    let bg_old = solid((30, 40, 50), 4, 4);
    let mut bg_new = solid((30, 40, 50), 4, 4);
    bg_new.data[5 * 3 + 1] = 0; // pixel 5, not masked
    let live = solid((200, 200, 200), 4, 4);
    let mask = mask_with(4, 4, &[0]);

    let before = composite(&bg_old, &live, &mask);
    let after = composite(&bg_new, &live, &mask);
    assert_eq!(before.data, after.data);
}
