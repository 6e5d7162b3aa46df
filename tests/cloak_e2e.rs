//! End-to-end tests for the cloak pipeline on synthetic frames.
//!
//! These drive the full threshold -> morphology -> blur -> composite
//! chain the way the session loop does, without a camera:
//! - A frame fully colored with the profile's exact lower-bound HSV value
//!   masks completely and composites to the background everywhere
//! - A frame with no matching pixels passes through untouched
//! - Config-defined custom colors drive the same pipeline
//! - Recorder argument/filename construction used by the recording path

use cloakcam::camera::{Frame, FrameFormat};
use cloakcam::color::{rgb_to_hsv, ColorRegistry, Hsv};
use cloakcam::compositor::composite;
use cloakcam::config::Config;
use cloakcam::mask::{build_mask, threshold, MaskBuilder, MaskSettings, MASK_OFF, MASK_ON};
use cloakcam::recorder::{build_ffmpeg_args, output_filename, RecorderSettings};
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

fn uniform_frame(rgb: (u8, u8, u8), width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
    }
    make_frame(data, width, height)
}

/// A scene-like background: a horizontal yellow-to-blue gradient. Its
/// hues stay at 30 or 120 in the halved convention, never inside the
/// red profile's bands.
fn gradient_background(width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _y in 0..height {
        for x in 0..width {
            let v = ((x as f32 / width as f32) * 255.0) as u8;
            data.extend_from_slice(&[v, v, 255 - v]);
        }
    }
    make_frame(data, width, height)
}

#[test]
fn test_lower_bound_frame_becomes_fully_invisible() {
    // RGB (70, 37, 37) converts to exactly HSV (0, 120, 70), the red
    // profile's lower bound
    assert_eq!(rgb_to_hsv(70, 37, 37), Hsv::new(0, 120, 70));

    let registry = ColorRegistry::builtin();
    let red = registry.lookup("red");
    let live = uniform_frame((70, 37, 37), 10, 10);
    let background = gradient_background(10, 10);

    // Thresholding alone already includes every pixel
    let raw = threshold(&live, red);
    assert_eq!(raw.coverage(), 100);

    // The full pipeline keeps the mask fully included
    let mask = build_mask(&live, red, MaskSettings::default());
    assert!(mask.data.iter().all(|&v| v == MASK_ON));

    // And the composite equals the background everywhere
    let out = composite(&background, &live, &mask);
    assert_eq!(out.data, background.data);
}

#[test]
fn test_non_matching_frame_passes_through() {
    let registry = ColorRegistry::builtin();
    let red = registry.lookup("red");
    let live = gradient_background(12, 9); // no red-saturated pixels
    let background = uniform_frame((0, 0, 0), 12, 9);

    let mask = build_mask(&live, red, MaskSettings::default());
    assert!(mask.data.iter().all(|&v| v == MASK_OFF));

    let out = composite(&background, &live, &mask);
    assert_eq!(out.data, live.data);
}

#[test]
fn test_cloaked_region_shows_background_rest_shows_live() {
    let registry = ColorRegistry::builtin();
    let red = registry.lookup("red");

    // Gray scene with a 4x4 red patch in the middle of a 20x20 frame
    let mut data = vec![128u8; 20 * 20 * 3];
    for y in 8..12 {
        for x in 8..12 {
            let idx = (y * 20 + x) * 3;
            data[idx] = 255;
            data[idx + 1] = 0;
            data[idx + 2] = 0;
        }
    }
    let live = make_frame(data, 20, 20);
    let background = gradient_background(20, 20);

    let mask = build_mask(&live, red, MaskSettings::default());
    let out = composite(&background, &live, &mask);

    // Center of the patch shows the background
    let center = (10 * 20 + 10) * 3;
    assert_eq!(&out.data[center..center + 3], &background.data[center..center + 3]);
    // Far corner shows the live frame
    assert_eq!(&out.data[0..3], &live.data[0..3]);
}

#[test]
fn test_session_style_loop_with_buffer_reuse() {
    // Drive several frames through one MaskBuilder the way the session
    // loop does, alternating matching and non-matching content
    let registry = ColorRegistry::builtin();
    let red = registry.lookup("red");
    let background = gradient_background(10, 10);
    let mut builder = MaskBuilder::default();

    for i in 0..4 {
        let live = if i % 2 == 0 {
            uniform_frame((255, 0, 0), 10, 10)
        } else {
            uniform_frame((128, 128, 128), 10, 10)
        };
        let mask = builder.build(&live, red);
        let out = composite(&background, &live, &mask);
        if i % 2 == 0 {
            assert_eq!(out.data, background.data, "frame {} should be cloaked", i);
        } else {
            assert_eq!(out.data, live.data, "frame {} should pass through", i);
        }
    }
}

#[test]
fn test_background_recapture_swaps_composite_source() {
    let registry = ColorRegistry::builtin();
    let red = registry.lookup("red");
    let live = uniform_frame((255, 0, 0), 8, 8);
    let mask = build_mask(&live, red, MaskSettings::default());
    assert!(mask.data.iter().all(|&v| v == MASK_ON));

    let bg_old = uniform_frame((10, 20, 30), 8, 8);
    let bg_new = uniform_frame((200, 210, 220), 8, 8);

    let before = composite(&bg_old, &live, &mask);
    let after = composite(&bg_new, &live, &mask);
    assert_eq!(before.data, bg_old.data);
    assert_eq!(after.data, bg_new.data);
}

#[test]
fn test_config_defined_color_drives_pipeline() {
    let config = Config::from_str(
        r#"
        [colors.pumpkin]
        lower = [10, 100, 100]
        upper = [25, 255, 255]
        "#,
    )
    .unwrap();
    let registry = config.color_registry();
    let pumpkin = registry.lookup("pumpkin");

    // Orange: RGB (255, 128, 0) -> hue around 15
    let hsv = rgb_to_hsv(255, 128, 0);
    assert!(pumpkin.matches(hsv), "orange should match, got {:?}", hsv);

    let live = uniform_frame((255, 128, 0), 10, 10);
    let background = uniform_frame((0, 0, 0), 10, 10);
    let mask = build_mask(&live, pumpkin, config.mask_settings());
    let out = composite(&background, &live, &mask);
    assert_eq!(out.data, background.data);
}

#[test]
fn test_unknown_cli_table_color_falls_back_to_red() {
    // The registry's permissive fallback: an unknown name behaves as red
    let registry = ColorRegistry::builtin();
    let profile = registry.lookup("chartreuse");
    assert_eq!(profile.name, "red");

    let live = uniform_frame((255, 0, 0), 6, 6);
    let mask = build_mask(&live, profile, MaskSettings::default());
    assert!(mask.data.iter().all(|&v| v == MASK_ON));
}

// ==================== Recording path construction ====================

#[test]
fn test_recorder_arguments_for_camera_dimensions() {
    let settings = RecorderSettings {
        fps: 30,
        codec: "mpeg4".to_string(),
        container: "avi".to_string(),
    };
    let name = output_filename(&settings);
    let args = build_ffmpeg_args(1280, 720, &settings, &name);

    assert!(args.contains(&"1280x720".to_string()));
    assert!(args.contains(&"30".to_string()));
    assert_eq!(args.last(), Some(&name));
    assert!(name.starts_with("invisibility_cloak_"));
    assert!(name.ends_with(".avi"));
}
