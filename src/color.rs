//! Cloak color profiles and HSV color space support.
//!
//! Detection works in HSV because hue isolates color identity from
//! lighting, which keeps the threshold usable as room illumination shifts.
//! All values use the 8-bit OpenCV-style convention: hue 0-180,
//! saturation and value 0-255.

use std::collections::HashMap;

/// An HSV pixel in the 8-bit convention (hue 0-180, sat/val 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// An inclusive HSV box: a pixel matches iff every channel lies within
/// the lower/upper bounds.
#[derive(Debug, Clone, Copy)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Inclusive containment check on all three channels.
    pub fn contains(&self, px: Hsv) -> bool {
        px.h >= self.lower.h
            && px.h <= self.upper.h
            && px.s >= self.lower.s
            && px.s <= self.upper.s
            && px.v >= self.lower.v
            && px.v <= self.upper.v
    }
}

/// A named cloak color: one HSV range, or two for hues that wrap around
/// the hue circle (red).
#[derive(Debug, Clone)]
pub struct ColorProfile {
    pub name: String,
    pub ranges: Vec<HsvRange>,
}

impl ColorProfile {
    pub fn new(name: impl Into<String>, ranges: Vec<HsvRange>) -> Self {
        Self {
            name: name.into(),
            ranges,
        }
    }

    /// True if any of the profile's ranges contains the pixel.
    pub fn matches(&self, px: Hsv) -> bool {
        self.ranges.iter().any(|r| r.contains(px))
    }
}

/// Name of the profile `ColorRegistry::lookup` falls back to.
pub const DEFAULT_COLOR: &str = "red";

/// Registry of cloak color profiles.
///
/// Built-in colors (red, blue, green, yellow) are always present; config
/// entries may override them or add new names. Lookup is case-insensitive
/// and falls back to red for unknown names rather than failing.
#[derive(Debug, Clone)]
pub struct ColorRegistry {
    profiles: HashMap<String, ColorProfile>,
}

impl ColorRegistry {
    /// Registry with only the built-in color table.
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in builtin_profiles() {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }

    /// Insert or replace a profile. The name is stored lowercased.
    pub fn insert(&mut self, profile: ColorProfile) {
        let key = profile.name.to_lowercase();
        self.profiles.insert(
            key.clone(),
            ColorProfile {
                name: key,
                ranges: profile.ranges,
            },
        );
    }

    /// Look up a profile by name, case-insensitive.
    ///
    /// Unknown names fall back to the red profile instead of erroring.
    pub fn lookup(&self, name: &str) -> &ColorProfile {
        self.profiles
            .get(&name.to_lowercase())
            .unwrap_or_else(|| &self.profiles[DEFAULT_COLOR])
    }

    /// Names of all registered profiles, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ColorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The built-in color table.
///
/// Red needs two ranges because its hue band straddles the wrap point of
/// the hue circle; the two bands are disjoint by construction.
fn builtin_profiles() -> Vec<ColorProfile> {
    vec![
        ColorProfile::new(
            "red",
            vec![
                HsvRange::new(Hsv::new(0, 120, 70), Hsv::new(10, 255, 255)),
                HsvRange::new(Hsv::new(170, 120, 70), Hsv::new(180, 255, 255)),
            ],
        ),
        ColorProfile::new(
            "blue",
            vec![HsvRange::new(Hsv::new(94, 80, 2), Hsv::new(126, 255, 255))],
        ),
        ColorProfile::new(
            "green",
            vec![HsvRange::new(Hsv::new(35, 80, 50), Hsv::new(85, 255, 255))],
        ),
        ColorProfile::new(
            "yellow",
            vec![HsvRange::new(
                Hsv::new(20, 100, 100),
                Hsv::new(30, 255, 255),
            )],
        ),
    ]
}

/// Convert one RGB pixel to HSV in the 8-bit convention.
///
/// Hue is computed in degrees and halved to fit 0-180; saturation and
/// value are scaled to 0-255. Matches the OpenCV BGR2HSV definition for
/// 8-bit images.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    if delta == 0 {
        return Hsv::new(0, 0, v);
    }

    let s = ((255u32 * delta as u32 + (v as u32 / 2)) / v as u32) as u8;

    let delta_f = delta as f32;
    let mut h_deg = if v == r {
        60.0 * (g as f32 - b as f32) / delta_f
    } else if v == g {
        120.0 + 60.0 * (b as f32 - r as f32) / delta_f
    } else {
        240.0 + 60.0 * (r as f32 - g as f32) / delta_f
    };
    if h_deg < 0.0 {
        h_deg += 360.0;
    }

    Hsv::new((h_deg / 2.0).round() as u8, s, v)
}

/// Convert one HSV pixel back to RGB.
///
/// Used to synthesize frames of known hue, mainly in tests and fixtures.
pub fn hsv_to_rgb(px: Hsv) -> (u8, u8, u8) {
    let h_deg = px.h as f32 * 2.0;
    let s = px.s as f32 / 255.0;
    let v = px.v as f32 / 255.0;

    let c = v * s;
    let h_prime = h_deg / 60.0;
    let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    )
}
