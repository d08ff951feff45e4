//! Point tessellation: fixed shapes built from triangles around an anchor
//! point, and texture-atlas-backed markers.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cartesian::RenderPoint;
use crate::color::Color;
use crate::render::buffer::{BufferKind, GeometryBuffer};
use crate::render::RasterImage;

const NORMAL_45: f32 = std::f32::consts::FRAC_1_SQRT_2;
const DEG2RAD: f32 = PI / 180.0;

/// Named icon images markers pick their texture from.
pub type TextureAtlas = ahash::HashMap<String, Arc<RasterImage>>;

/// Tessellation of a point geometry into an exact number of vertices.
///
/// Implemented by the primitive shape style and the marker style; the fill
/// engine only needs the vertex count and the emission operation.
pub trait PointTessellator {
    /// Kind of buffer the emitted vertices belong to.
    fn buffer_kind(&self) -> BufferKind;

    /// Exact number of vertices [`add_point`](PointTessellator::add_point)
    /// writes.
    fn vertex_count(&self) -> usize;

    /// Emits one point's geometry and returns the advanced local index.
    fn add_point(&self, pt: RenderPoint, z: f32, index: u32, buffer: &mut GeometryBuffer) -> u32;
}

/// Shape of a primitive point style.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointShape {
    /// Axis-aligned square.
    Square,
    /// Wide rectangle.
    Rectangle,
    /// Triangle fan approximating a circle.
    #[default]
    Circle,
    /// Upward triangle.
    Triangle,
    /// Four-corner diamond.
    Diamond,
    /// Star with a configurable number of rays.
    Star,
}

/// Style of point features drawn as primitive shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointStyle {
    shape: PointShape,
    size: f32,
    rotation: f32,
    color: Color,
    #[serde(rename = "segments")]
    segment_count: u8,
    #[serde(rename = "starEnds")]
    star_rays: u8,
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            shape: PointShape::default(),
            size: 6.0,
            rotation: 0.0,
            color: Color::BLACK,
            segment_count: 10,
            star_rays: 5,
        }
    }
}

impl PointStyle {
    /// Creates a style drawing the given shape.
    pub fn new(shape: PointShape, color: Color, size: f32) -> Self {
        Self {
            shape,
            color,
            size,
            ..Self::default()
        }
    }

    /// The drawn shape.
    pub fn shape(&self) -> PointShape {
        self.shape
    }

    /// Sets the drawn shape.
    pub fn set_shape(&mut self, shape: PointShape) {
        self.shape = shape;
    }

    /// Shape size in screen units.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Sets the shape size.
    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    /// Fill color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Sets the fill color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Rotation in degrees.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Sets the rotation in degrees.
    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    /// Triangle count of the circle fan.
    pub fn segment_count(&self) -> u8 {
        self.segment_count
    }

    /// Sets the triangle count of the circle fan.
    pub fn set_segment_count(&mut self, count: u8) {
        self.segment_count = count;
    }

    /// Number of star rays.
    pub fn star_rays(&self) -> u8 {
        self.star_rays
    }
}

impl PointTessellator for PointStyle {
    fn buffer_kind(&self) -> BufferKind {
        BufferKind::Point
    }

    fn vertex_count(&self) -> usize {
        match self.shape {
            PointShape::Square | PointShape::Rectangle | PointShape::Diamond => 4,
            PointShape::Triangle => 3,
            PointShape::Circle => 3 * self.segment_count as usize,
            PointShape::Star => 3 * self.star_rays as usize,
        }
    }

    fn add_point(
        &self,
        pt: RenderPoint,
        z: f32,
        mut index: u32,
        buffer: &mut GeometryBuffer,
    ) -> u32 {
        match self.shape {
            PointShape::Square => {
                for normal in [
                    (-NORMAL_45, NORMAL_45),
                    (NORMAL_45, NORMAL_45),
                    (NORMAL_45, -NORMAL_45),
                    (-NORMAL_45, -NORMAL_45),
                ] {
                    push_vertex(buffer, pt, z, normal);
                }
                index = push_quad_indices(buffer, index);
            }
            PointShape::Rectangle => {
                for normal in [
                    (-0.866_025_4, 0.5),
                    (0.866_025_4, 0.5),
                    (0.866_025_4, -0.5),
                    (-0.866_025_4, -0.5),
                ] {
                    push_vertex(buffer, pt, z, normal);
                }
                index = push_quad_indices(buffer, index);
            }
            PointShape::Circle => {
                let step = (PI + PI) / self.segment_count as f32;
                let mut current = 0.0f32;
                for _ in 0..self.segment_count {
                    push_vertex(buffer, pt, z, (current.cos(), current.sin()));
                    current += step;
                    push_vertex(buffer, pt, z, (current.cos(), current.sin()));
                    push_vertex(buffer, pt, z, (0.0, 0.0));

                    for _ in 0..3 {
                        buffer.add_index(index as u16);
                        index += 1;
                    }
                }
            }
            PointShape::Triangle => {
                for normal in [(0.0, 1.0), (0.866_025_4, -0.5), (-0.866_025_4, -0.5)] {
                    push_vertex(buffer, pt, z, normal);
                }
                for _ in 0..3 {
                    buffer.add_index(index as u16);
                    index += 1;
                }
            }
            PointShape::Diamond => {
                for normal in [
                    (0.0, 1.0),
                    (NORMAL_45, 0.0),
                    (-NORMAL_45, 0.0),
                    (0.0, -1.0),
                ] {
                    push_vertex(buffer, pt, z, normal);
                }
                for offset in [0, 1, 2, 1, 2, 3] {
                    buffer.add_index((index + offset) as u16);
                }
                index += 4;
            }
            PointShape::Star => {
                let start = FRAC_PI_2;
                let end = FRAC_PI_2 + PI + PI;
                let step = (end - start) / self.star_rays as f32;
                let mut current = start;
                for _ in 0..self.star_rays {
                    // Ray tip, then the two base corners across the center.
                    push_vertex(buffer, pt, z, (current.cos(), current.sin()));

                    let bx = 0.35 * (current + FRAC_PI_2).cos();
                    let by = 0.35 * (current + FRAC_PI_2).sin();
                    push_vertex(buffer, pt, z, (bx, by));
                    push_vertex(buffer, pt, z, (-bx, -by));

                    for _ in 0..3 {
                        buffer.add_index(index as u16);
                        index += 1;
                    }

                    current += step;
                }
            }
        }

        index
    }
}

/// Style of point features drawn as icons from a texture atlas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    icon_set: String,
    icon_index: u16,
    icon_width: u8,
    icon_height: u8,
    size: f32,
    rotation: f32,
    #[serde(skip)]
    image: Option<Arc<RasterImage>>,
    #[serde(skip)]
    uv: [f32; 4],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            icon_set: String::new(),
            icon_index: 0,
            icon_width: 0,
            icon_height: 0,
            size: 12.0,
            rotation: 0.0,
            image: None,
            uv: [0.0; 4],
        }
    }
}

impl MarkerStyle {
    /// Selects the icon to draw: an icon set from the atlas plus the index
    /// and cell size of the icon within it.
    pub fn set_icon(
        &mut self,
        atlas: &TextureAtlas,
        icon_set: &str,
        index: u16,
        width: u8,
        height: u8,
    ) -> bool {
        let Some(image) = atlas.get(icon_set) else {
            return false;
        };
        if width == 0 || height == 0 {
            return false;
        }

        let atlas_size = image.width();
        self.icon_set = icon_set.to_string();
        self.icon_index = index;
        self.icon_width = width;
        self.icon_height = height;
        self.image = Some(image.clone());

        let icons_per_line = atlas_size / width as usize;
        if icons_per_line == 0 {
            return false;
        }
        let line = index as usize / icons_per_line;
        let column = index as usize - line * icons_per_line;
        let w = column * width as usize;
        let h = line * height as usize;

        let ulx = (w + width as usize - 1) as f32 / atlas_size as f32;
        let uly = (h + height as usize - 1) as f32 / atlas_size as f32;
        let lrx = w as f32 / atlas_size as f32;
        let lry = h as f32 / atlas_size as f32;
        self.uv = [ulx, uly, lrx, lry];

        true
    }

    /// Re-resolves the atlas image after deserialization.
    pub fn resolve(&mut self, atlas: &TextureAtlas) -> bool {
        let (icon_set, index, width, height) = (
            self.icon_set.clone(),
            self.icon_index,
            self.icon_width,
            self.icon_height,
        );
        self.set_icon(atlas, &icon_set, index, width, height)
    }

    /// The resolved atlas image, if any.
    pub fn image(&self) -> Option<&Arc<RasterImage>> {
        self.image.as_ref()
    }

    /// Icon size in screen units.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Sets the icon size.
    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    /// Rotation in degrees.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Sets the rotation in degrees.
    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }
}

impl PointTessellator for MarkerStyle {
    fn buffer_kind(&self) -> BufferKind {
        BufferKind::Texture
    }

    fn vertex_count(&self) -> usize {
        4
    }

    fn add_point(
        &self,
        pt: RenderPoint,
        z: f32,
        mut index: u32,
        buffer: &mut GeometryBuffer,
    ) -> u32 {
        let [ulx, uly, lrx, lry] = self.uv;

        let alpha = if self.icon_height == 0 {
            FRAC_PI_2
        } else {
            (self.icon_width as f32 / self.icon_height as f32).atan()
        };
        let rotation = DEG2RAD * (180.0 - self.rotation);

        let nx1 = (alpha + rotation).cos();
        let ny1 = (alpha + rotation).sin();
        let nx2 = (PI - alpha + rotation).cos();
        let ny2 = (PI - alpha + rotation).sin();

        for (normal, uv) in [
            ((nx1, ny1), (lrx, uly)),
            ((nx2, ny2), (ulx, uly)),
            ((-nx1, -ny1), (ulx, lry)),
            ((-nx2, -ny2), (lrx, lry)),
        ] {
            push_vertex(buffer, pt, z, normal);
            buffer.add_vertex(uv.0);
            buffer.add_vertex(uv.1);
        }

        for offset in [0, 1, 2, 0, 2, 3] {
            buffer.add_index((index + offset) as u16);
        }
        index += 4;

        index
    }
}

fn push_vertex(buffer: &mut GeometryBuffer, pt: RenderPoint, z: f32, normal: (f32, f32)) {
    buffer.add_vertex(pt.x);
    buffer.add_vertex(pt.y);
    buffer.add_vertex(z);
    buffer.add_vertex(normal.0);
    buffer.add_vertex(normal.1);
}

fn push_quad_indices(buffer: &mut GeometryBuffer, index: u32) -> u32 {
    for offset in [0, 1, 2, 0, 2, 3] {
        buffer.add_index((index + offset) as u16);
    }
    index + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_vertex_counts_are_exact() {
        for (shape, expected) in [
            (PointShape::Square, 4),
            (PointShape::Rectangle, 4),
            (PointShape::Triangle, 3),
            (PointShape::Diamond, 4),
            (PointShape::Circle, 30),
            (PointShape::Star, 15),
        ] {
            let style = PointStyle::new(shape, Color::BLACK, 4.0);
            let mut buffer = GeometryBuffer::new(BufferKind::Point);
            let next = style.add_point(RenderPoint::new(1.0, 2.0), 0.0, 0, &mut buffer);

            assert_eq!(style.vertex_count(), expected, "{shape:?} count");
            assert_eq!(buffer.vertex_count(), expected, "{shape:?} emitted");
            assert_eq!(next as usize, expected, "{shape:?} advanced index");
        }
    }

    #[test]
    fn marker_without_atlas_entry_is_rejected() {
        let atlas = TextureAtlas::default();
        let mut style = MarkerStyle::default();
        assert!(!style.set_icon(&atlas, "missing", 0, 16, 16));
        assert!(style.image().is_none());
    }

    #[test]
    fn marker_emits_textured_quad() {
        let mut atlas = TextureAtlas::default();
        atlas.insert(
            "icons".to_string(),
            Arc::new(RasterImage::new(vec![0; 64 * 64 * 4], 64, 64, true)),
        );

        let mut style = MarkerStyle::default();
        assert!(style.set_icon(&atlas, "icons", 2, 16, 16));

        let mut buffer = GeometryBuffer::new(BufferKind::Texture);
        let next = style.add_point(RenderPoint::new(0.0, 0.0), 0.0, 0, &mut buffer);

        assert_eq!(next, 4);
        assert_eq!(buffer.vertex_count(), 4);
        assert_eq!(buffer.indices(), &[0, 1, 2, 0, 2, 3]);
    }
}
