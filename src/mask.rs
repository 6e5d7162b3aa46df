//! Cloak mask construction.
//!
//! A mask marks the pixels of a frame that match the active cloak color.
//! The pipeline is fixed: HSV threshold, morphological opening (salt
//! noise), morphological closing (holes), dilation (edge feathering and
//! motion blur), Gaussian smoothing, then re-binarization. Masks are
//! binary: every sample is either [`MASK_OFF`] or [`MASK_ON`].
//!
//! The morphology and blur stages clamp their neighborhoods at the image
//! border, so a uniformly-on mask stays uniformly on.

use crate::camera::Frame;
use crate::color::{rgb_to_hsv, ColorProfile};

/// Sample value for a masked (cloak) pixel.
pub const MASK_ON: u8 = 255;
/// Sample value for an unmasked pixel.
pub const MASK_OFF: u8 = 0;

/// A single-channel binary mask with the same dimensions as its source
/// frame. Recomputed every iteration, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    /// One byte per pixel, row-major; MASK_OFF or MASK_ON.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Mask {
    /// An all-off mask of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![MASK_OFF; (width * height) as usize],
            width,
            height,
        }
    }

    /// Number of masked pixels.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v != MASK_OFF).count()
    }
}

/// Tunable stage parameters for the mask pipeline.
///
/// Kernel sizes must be odd. Defaults match the stock detection settings.
#[derive(Debug, Clone, Copy)]
pub struct MaskSettings {
    /// Opening kernel (erode then dilate) for salt-noise removal.
    pub open_kernel: u32,
    /// Closing kernel (dilate then erode) for hole filling.
    pub close_kernel: u32,
    /// Kernel for the final dilation passes.
    pub dilate_kernel: u32,
    /// Number of final dilation passes.
    pub dilate_iterations: u32,
    /// Gaussian smoothing kernel.
    pub blur_kernel: u32,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            open_kernel: 3,
            close_kernel: 5,
            dilate_kernel: 3,
            dilate_iterations: 2,
            blur_kernel: 5,
        }
    }
}

/// Builds cloak masks, reusing scratch buffers across frames.
#[derive(Debug)]
pub struct MaskBuilder {
    settings: MaskSettings,
    scratch: Vec<u8>,
}

impl MaskBuilder {
    pub fn new(settings: MaskSettings) -> Self {
        Self {
            settings,
            scratch: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MaskSettings {
        &self.settings
    }

    /// Run the full mask pipeline for one frame.
    pub fn build(&mut self, frame: &Frame, profile: &ColorProfile) -> Mask {
        let mut mask = threshold(frame, profile);
        let (w, h) = (mask.width, mask.height);
        let s = self.settings;

        // Opening: erode then dilate
        erode(&mask.data, w, h, s.open_kernel, &mut self.scratch);
        dilate(&self.scratch, w, h, s.open_kernel, &mut mask.data);

        // Closing: dilate then erode
        dilate(&mask.data, w, h, s.close_kernel, &mut self.scratch);
        erode(&self.scratch, w, h, s.close_kernel, &mut mask.data);

        // Expand the detected region to cover cloak edge feathering
        for _ in 0..s.dilate_iterations {
            dilate(&mask.data, w, h, s.dilate_kernel, &mut self.scratch);
            std::mem::swap(&mut mask.data, &mut self.scratch);
        }

        // Soften hard edges, then snap back to a binary mask: any pixel
        // the blur touched counts as cloak
        gaussian_blur(&mask.data, w, h, s.blur_kernel, &mut self.scratch);
        std::mem::swap(&mut mask.data, &mut self.scratch);
        binarize(&mut mask.data);

        mask
    }
}

impl Default for MaskBuilder {
    fn default() -> Self {
        Self::new(MaskSettings::default())
    }
}

/// Build a mask with default scratch buffers. Convenience wrapper around
/// [`MaskBuilder`] for one-off use.
pub fn build_mask(frame: &Frame, profile: &ColorProfile, settings: MaskSettings) -> Mask {
    MaskBuilder::new(settings).build(frame, profile)
}

/// HSV-threshold a frame against a profile.
///
/// A pixel is on iff its HSV value lies inside any of the profile's
/// inclusive ranges. For two-range profiles (red) the result is the union
/// of the per-range masks; the hue bands are disjoint, so union and
/// saturating addition coincide.
pub fn threshold(frame: &Frame, profile: &ColorProfile) -> Mask {
    let mut data = Vec::with_capacity(frame.pixel_count());

    for rgb in frame.data.chunks_exact(3) {
        let hsv = rgb_to_hsv(rgb[0], rgb[1], rgb[2]);
        data.push(if profile.matches(hsv) { MASK_ON } else { MASK_OFF });
    }

    Mask {
        data,
        width: frame.width,
        height: frame.height,
    }
}

/// Morphological erosion: each output sample is the minimum over the
/// kernel neighborhood, clamped to the image bounds.
pub fn erode(src: &[u8], width: u32, height: u32, kernel: u32, dst: &mut Vec<u8>) {
    morph(src, width, height, kernel, dst, |acc, v| acc.min(v), MASK_ON)
}

/// Morphological dilation: each output sample is the maximum over the
/// kernel neighborhood, clamped to the image bounds.
pub fn dilate(src: &[u8], width: u32, height: u32, kernel: u32, dst: &mut Vec<u8>) {
    morph(src, width, height, kernel, dst, |acc, v| acc.max(v), MASK_OFF)
}

fn morph(
    src: &[u8],
    width: u32,
    height: u32,
    kernel: u32,
    dst: &mut Vec<u8>,
    combine: impl Fn(u8, u8) -> u8,
    identity: u8,
) {
    assert_eq!(src.len(), (width * height) as usize, "mask buffer size");
    assert!(kernel % 2 == 1, "kernel size must be odd");

    dst.clear();
    dst.reserve(src.len());

    let r = (kernel / 2) as i64;
    let (w, h) = (width as i64, height as i64);

    for y in 0..h {
        for x in 0..w {
            let mut acc = identity;
            for ny in (y - r).max(0)..=(y + r).min(h - 1) {
                for nx in (x - r).max(0)..=(x + r).min(w - 1) {
                    acc = combine(acc, src[(ny * w + nx) as usize]);
                }
            }
            dst.push(acc);
        }
    }
}

/// Separable Gaussian smoothing with a binomial kernel and replicated
/// borders.
pub fn gaussian_blur(src: &[u8], width: u32, height: u32, kernel: u32, dst: &mut Vec<u8>) {
    assert_eq!(src.len(), (width * height) as usize, "mask buffer size");
    assert!(kernel % 2 == 1, "kernel size must be odd");

    let weights = binomial_kernel(kernel);
    let norm: u32 = weights.iter().sum();
    let r = (kernel / 2) as i64;
    let (w, h) = (width as i64, height as i64);

    // Horizontal pass
    let mut tmp = vec![0u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for (i, &wt) in weights.iter().enumerate() {
                let nx = (x + i as i64 - r).clamp(0, w - 1);
                sum += wt * src[(y * w + nx) as usize] as u32;
            }
            tmp[(y * w + x) as usize] = ((sum + norm / 2) / norm) as u8;
        }
    }

    // Vertical pass
    dst.clear();
    dst.reserve(src.len());
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for (i, &wt) in weights.iter().enumerate() {
                let ny = (y + i as i64 - r).clamp(0, h - 1);
                sum += wt * tmp[(ny * w + x) as usize] as u32;
            }
            dst.push(((sum + norm / 2) / norm) as u8);
        }
    }
}

/// Snap every nonzero sample to MASK_ON.
pub fn binarize(buf: &mut [u8]) {
    for v in buf.iter_mut() {
        if *v != MASK_OFF {
            *v = MASK_ON;
        }
    }
}

/// Binomial coefficient row of the given odd length, e.g. 5 -> [1,4,6,4,1].
fn binomial_kernel(kernel: u32) -> Vec<u32> {
    let mut row = vec![1u32];
    for _ in 1..kernel {
        let mut next = vec![1u32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}
