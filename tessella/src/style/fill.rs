//! Polygon fill styles.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::style::line::LineStyle;

/// Style of polygon interiors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillStyle {
    color: Color,
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
        }
    }
}

impl FillStyle {
    /// Creates a fill with the given interior color.
    pub fn new(color: Color) -> Self {
        Self { color }
    }

    /// Interior color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Sets the interior color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

/// Polygon interior plus a stroked border, dispatched per buffer kind at
/// draw time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillBorderedStyle {
    /// Interior fill.
    pub fill: FillStyle,
    /// Border stroke; rings are tessellated with the line pipeline.
    pub border: LineStyle,
}

impl Default for FillBorderedStyle {
    fn default() -> Self {
        Self {
            fill: FillStyle::default(),
            border: LineStyle::new(Color::GRAY, 1.0),
        }
    }
}
