//! Render backend seam and draw-time parameter types.
//!
//! The crate does not talk to a GPU directly. Filled buffers are handed to a
//! [`RenderBackend`] implementation together with a [`Paint`] resolved from
//! the active style for the buffer's kind.

use std::sync::Arc;

use crate::color::Color;
use crate::error::TessellaError;

pub mod buffer;

pub use buffer::{BufferArray, BufferKind, BufferWriter, GeometryBuffer};

/// Decoded RGBA image ready for texturing (a raster tile read or a marker
/// icon atlas).
#[derive(Debug, Clone)]
pub struct RasterImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    smooth: bool,
}

impl RasterImage {
    /// Wraps raw RGBA pixel data.
    pub fn new(data: Vec<u8>, width: usize, height: usize, smooth: bool) -> Self {
        Self {
            data,
            width,
            height,
            smooth,
        }
    }

    /// Raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the texture should be sampled with linear filtering.
    pub fn smooth(&self) -> bool {
        self.smooth
    }
}

/// Draw-time parameters for point-shape buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPaint {
    /// Fill color of the shape.
    pub color: Color,
    /// Shape size in screen units.
    pub size: f32,
}

/// Draw-time parameters for line ribbon buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePaint {
    /// Stroke color.
    pub color: Color,
    /// Half-width the normals are scaled by in screen units.
    pub width: f32,
}

/// Draw-time parameters for polygon interiors.
#[derive(Debug, Clone, PartialEq)]
pub struct FillPaint {
    /// Interior color.
    pub color: Color,
}

/// Draw-time parameters for textured buffers.
#[derive(Debug, Clone)]
pub struct ImagePaint {
    /// Texture sampled by the quad.
    pub image: Arc<RasterImage>,
}

/// Parameters of one indexed draw, resolved from a style for a specific
/// buffer kind.
#[derive(Debug, Clone)]
pub enum Paint {
    /// Point-shape draw.
    Point(PointPaint),
    /// Line ribbon draw.
    Line(LinePaint),
    /// Polygon interior draw.
    Fill(FillPaint),
    /// Textured quad draw.
    Image(ImagePaint),
}

/// The GPU collaborator. Implementations own the actual device resources;
/// texture residency is theirs to manage, buffer residency is driven by
/// [`GeometryBuffer::bind`].
pub trait RenderBackend {
    /// Creates device-side vertex/index objects for the buffer's data.
    fn upload_buffer(&mut self, buffer: &GeometryBuffer) -> Result<(), TessellaError>;

    /// Issues one indexed draw of the buffer with the given parameters.
    fn draw_elements(&mut self, paint: &Paint, buffer: &GeometryBuffer);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Backend double that records upload and draw traffic.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub uploads: usize,
        pub draws: Vec<(BufferKind, usize)>,
    }

    impl RenderBackend for RecordingBackend {
        fn upload_buffer(&mut self, _buffer: &GeometryBuffer) -> Result<(), TessellaError> {
            self.uploads += 1;
            Ok(())
        }

        fn draw_elements(&mut self, _paint: &Paint, buffer: &GeometryBuffer) {
            self.draws.push((buffer.kind(), buffer.index_count()));
        }
    }
}
