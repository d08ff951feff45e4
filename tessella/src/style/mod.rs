//! Pluggable style system.
//!
//! A style is a tagged variant over the rendering capabilities a layer can
//! have; kind-specific parameter structs hold the mutable rendering
//! parameters. Styles are stateless with respect to any one tile and are
//! reused across tiles.

use serde::{Deserialize, Serialize};

use crate::error::TessellaError;
use crate::layer::feature_layer::GeometryType;
use crate::render::buffer::BufferKind;
use crate::render::{FillPaint, ImagePaint, LinePaint, Paint, PointPaint};

pub mod fill;
pub mod line;
pub mod point;

pub use fill::{FillBorderedStyle, FillStyle};
pub use line::{CapKind, JoinKind, LineStyle};
pub use point::{MarkerStyle, PointShape, PointStyle, PointTessellator, TextureAtlas};

/// Rendering capability a style provides; selects the fill path of the tile
/// fill engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderType {
    /// Point geometry.
    Point,
    /// Line geometry.
    Line,
    /// Polygon geometry.
    Fill,
    /// Raster imagery.
    Image,
}

/// Style of raster quads. The texture comes with the tile data, so the
/// style itself carries no parameters.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStyle {}

/// A rendering style.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Style {
    /// Primitive point shapes.
    Point(PointStyle),
    /// Stroked lines.
    Line(LineStyle),
    /// Plain polygon fill.
    Fill(FillStyle),
    /// Polygon fill with a stroked border.
    FillBordered(FillBorderedStyle),
    /// Texture-atlas markers.
    Marker(MarkerStyle),
    /// Raster imagery.
    Image(ImageStyle),
}

impl Style {
    /// The rendering capability of this style.
    pub fn render_type(&self) -> RenderType {
        match self {
            Style::Point(_) | Style::Marker(_) => RenderType::Point,
            Style::Line(_) => RenderType::Line,
            Style::Fill(_) | Style::FillBordered(_) => RenderType::Fill,
            Style::Image(_) => RenderType::Image,
        }
    }

    /// The default style for a feature class of the given geometry kind.
    pub fn default_for(geometry: GeometryType) -> Style {
        match geometry {
            GeometryType::Point => Style::Point(PointStyle::default()),
            GeometryType::Line => Style::Line(LineStyle::default()),
            GeometryType::Polygon => Style::FillBordered(FillBorderedStyle::default()),
        }
    }

    /// Resolves draw parameters for a buffer of the given kind. `None` means
    /// the style has nothing to draw for that kind.
    pub fn paint_for(&self, kind: BufferKind) -> Option<Paint> {
        match (self, kind) {
            (Style::Point(style), BufferKind::Point) => Some(Paint::Point(PointPaint {
                color: style.color(),
                size: style.size(),
            })),
            (Style::Line(style), BufferKind::Line) => Some(Paint::Line(LinePaint {
                color: style.color(),
                width: style.width(),
            })),
            (Style::Fill(style), BufferKind::Fill) => Some(Paint::Fill(FillPaint {
                color: style.color(),
            })),
            (Style::FillBordered(style), BufferKind::Fill) => Some(Paint::Fill(FillPaint {
                color: style.fill.color(),
            })),
            (Style::FillBordered(style), BufferKind::Line) => Some(Paint::Line(LinePaint {
                color: style.border.color(),
                width: style.border.width(),
            })),
            (Style::Marker(style), BufferKind::Texture) => {
                let image = style.image()?.clone();
                Some(Paint::Image(ImagePaint { image }))
            }
            _ => None,
        }
    }

    /// Serializes the style into a JSON key-value tree.
    pub fn to_json(&self) -> Result<serde_json::Value, TessellaError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Restores a style from its JSON representation.
    pub fn from_json(value: serde_json::Value) -> Result<Style, TessellaError> {
        Ok(serde_json::from_value(value)?)
    }
}
