use log::warn;
use serde::{Deserialize, Serialize};

/// RGBA color of a style parameter.
///
/// Serializes as a HEX8 string (`#RRGGBBAA`) so that persisted styles stay
/// readable and diffable.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Opaque gray, the default border color.
    pub const GRAY: Color = Color::rgba(128, 128, 128, 255);

    /// Constructs a color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channels as normalized floats, the layout uniform buffers expect.
    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Formats the color as a HEX8 string: `#RRGGBBAA`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parses a HEX6 (`#RRGGBB`) or HEX8 (`#RRGGBBAA`) string.
    pub fn try_from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 7 && hex.len() != 9 || !hex.starts_with('#') {
            return None;
        }

        // `get` rejects non-ASCII input whose char boundaries fall mid-pair.
        let r = u8::from_str_radix(hex.get(1..3)?, 16).ok()?;
        let g = u8::from_str_radix(hex.get(3..5)?, 16).ok()?;
        let b = u8::from_str_radix(hex.get(5..7)?, 16).ok()?;
        let a = if hex.len() == 9 {
            u8::from_str_radix(hex.get(7..9)?, 16).ok()?
        } else {
            255
        };

        Some(Self { r, g, b, a })
    }
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        Self::try_from_hex(&value).unwrap_or_else(|| {
            warn!("invalid color {value:?}, defaulting to black");
            Color::BLACK
        })
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}
