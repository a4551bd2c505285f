//! Hex color parsing, HSV conversion and deterministic tag color allocation.
//!
//! A tag without a configured color gets one derived from a SHA-256 digest of
//! its name. Saturation and value are kept inside a mid-range band so derived
//! colors are never close to white or black, and the hue is rotated away from
//! hues already used by other tags in the same mapping.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ColorMap, configured_color};

pub const DARK_FOREGROUND: &str = "#000000";
pub const LIGHT_FOREGROUND: &str = "#ffffff";
/// Shown in place of a stored color that does not parse.
pub const FALLBACK_BACKGROUND: &str = "#6c757d";

/// BT.601 luma above which dark text is used.
const LUMA_THRESHOLD: f32 = 186.0;
const SATURATION_BAND: (f32, f32) = (0.45, 0.75);
const VALUE_BAND: (f32, f32) = (0.55, 0.80);
pub const MIN_HUE_DISTANCE: f32 = 12.0;
const MAX_HUE_PROBES: u32 = 8;
const GOLDEN_ANGLE_DEGREES: f32 = 137.507_76;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("color `{value}` must start with `#`")]
    MissingHash { value: String },

    #[error("color `{value}` must have 3 or 6 hex digits")]
    InvalidLength { value: String },

    #[error("color `{value}` contains a non-hex digit")]
    InvalidDigit { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn luma(self) -> f32 {
        f32::from(self.r) * 0.299 + f32::from(self.g) * 0.587 + f32::from(self.b) * 0.114
    }

    /// `(hue 0-360, saturation 0-1, value 0-1)`
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let r = f32::from(self.r) / 255.0;
        let g = f32::from(self.g) / 255.0;
        let b = f32::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / delta) % 6.0)
        } else if max == g {
            60.0 * (((b - r) / delta) + 2.0)
        } else {
            60.0 * (((r - g) / delta) + 4.0)
        };
        let hue = if hue < 0.0 { hue + 360.0 } else { hue };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        (hue, saturation, max)
    }

    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let c = value * saturation;
        let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
        let m = value - c;

        let (r, g, b) = if hue < 60.0 {
            (c, x, 0.0)
        } else if hue < 120.0 {
            (x, c, 0.0)
        } else if hue < 180.0 {
            (0.0, c, x)
        } else if hue < 240.0 {
            (0.0, x, c)
        } else if hue < 300.0 {
            (x, 0.0, c)
        } else {
            (c, 0.0, x)
        };

        Self::new(channel(r + m), channel(g + m), channel(b + m))
    }

    /// Hue of a chromatic color; grays have none.
    pub fn hue(self) -> Option<f32> {
        let (hue, saturation, _) = self.to_hsv();
        (saturation > 0.0).then_some(hue)
    }
}

fn channel(unit: f32) -> u8 {
    (unit.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Display for HexColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorParseError;

    /// Accepts `#rrggbb` and the `#rgb` shorthand, any letter case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash {
                value: value.to_owned(),
            })?;

        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit {
                value: value.to_owned(),
            });
        }

        let expanded = match digits.len() {
            6 => digits.to_owned(),
            3 => digits.chars().flat_map(|ch| [ch, ch]).collect(),
            _ => {
                return Err(ColorParseError::InvalidLength {
                    value: value.to_owned(),
                });
            }
        };

        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16).map_err(|_| ColorParseError::InvalidDigit {
                value: value.to_owned(),
            })
        };

        Ok(Self::new(component(0..2)?, component(2..4)?, component(4..6)?))
    }
}

/// Normalizes a color to lowercase `#rrggbb`.
pub fn normalize_color(value: &str) -> Result<String, ColorParseError> {
    value.parse::<HexColor>().map(|color| color.to_string())
}

/// Color to display for `tag`. A configured entry (own or prefix) is returned
/// unchanged; otherwise a color is derived from the tag name and from the hues
/// already taken in `existing`.
pub fn color_for(tag: &str, existing: &ColorMap) -> String {
    if let Some(color) = configured_color(tag, existing) {
        return color.to_owned();
    }

    derive_color(tag, existing).to_string()
}

fn derive_color(tag: &str, existing: &ColorMap) -> HexColor {
    let digest = Sha256::digest(tag.as_bytes());
    let base_hue = f32::from(u16::from_be_bytes([digest[0], digest[1]])) / 65_536.0 * 360.0;
    let saturation = within_band(SATURATION_BAND, digest[2]);
    let value = within_band(VALUE_BAND, digest[3]);

    let taken_hues = existing
        .iter()
        .filter(|(key, _)| key.as_str() != tag)
        .filter_map(|(_, color)| color.parse::<HexColor>().ok())
        .filter_map(HexColor::hue)
        .collect::<Vec<_>>();

    for probe in 0..MAX_HUE_PROBES {
        let hue = (base_hue + probe as f32 * GOLDEN_ANGLE_DEGREES).rem_euclid(360.0);
        let is_free = taken_hues
            .iter()
            .all(|taken| hue_distance(*taken, hue) >= MIN_HUE_DISTANCE);
        if is_free {
            return HexColor::from_hsv(hue, saturation, value);
        }
    }

    debug!(tag, "every hue probe collides; using base hue");
    HexColor::from_hsv(base_hue, saturation, value)
}

fn within_band((low, high): (f32, f32), byte: u8) -> f32 {
    low + (high - low) * f32::from(byte) / 255.0
}

pub fn hue_distance(a: f32, b: f32) -> f32 {
    let delta = (a - b).abs().rem_euclid(360.0);
    delta.min(360.0 - delta)
}

/// Foreground color for text drawn on `color`. Malformed input yields
/// [`DARK_FOREGROUND`].
pub fn invert(color: &str) -> &'static str {
    match color.parse::<HexColor>() {
        Ok(parsed) if parsed.luma() > LUMA_THRESHOLD => DARK_FOREGROUND,
        Ok(_) => LIGHT_FOREGROUND,
        Err(error) => {
            debug!(color, error = %error, "cannot invert malformed color");
            DARK_FOREGROUND
        }
    }
}
