//! Line tessellation: constant-width ribbons with configurable caps and
//! joins, emitted as indexed triangles.
//!
//! Every emission writes an exact, pre-computable number of vertices so that
//! callers can decide whether the current buffer must be sealed first.

use std::f32::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::cartesian::{Normal, RenderPoint};
use crate::color::Color;
use crate::render::buffer::GeometryBuffer;

/// Number of vertices one ribbon segment emits (a quad of two triangles).
pub const SEGMENT_VERTEX_COUNT: usize = 4;

const EPSILON: f32 = 1e-6;

/// How a line terminates at an open end.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapKind {
    /// No geometry past the endpoint.
    #[default]
    Butt,
    /// A fan of triangles spanning half a circle.
    Round,
    /// A quad extending half a line width past the endpoint.
    Square,
}

/// How consecutive segments connect at an interior vertex.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Two triangles reaching the sharp intersection of the outer edges.
    Miter,
    /// A fan of triangles sweeping between the adjacent normals.
    Round,
    /// A single triangle between the adjacent normals.
    #[default]
    Bevel,
}

/// Style of stroked lines and polygon borders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    #[serde(rename = "line_width")]
    width: f32,
    color: Color,
    cap: CapKind,
    join: JoinKind,
    #[serde(rename = "segments")]
    segment_count: u8,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            color: Color::BLACK,
            cap: CapKind::default(),
            join: JoinKind::default(),
            segment_count: 6,
        }
    }
}

/// Angle of a unit normal in radians, resolved into the correct quadrant
/// from the signs of its components.
pub(crate) fn angle_of(normal: Normal) -> f32 {
    if normal.y.abs() < EPSILON {
        return if normal.x > 0.0 { 0.0 } else { PI };
    }

    if normal.x.abs() < EPSILON {
        return if normal.y > 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };
    }

    let angle = normal.y.asin().abs();
    if normal.x < 0.0 && normal.y >= 0.0 {
        PI - angle
    } else if normal.x < 0.0 && normal.y <= 0.0 {
        angle - PI
    } else if normal.x > 0.0 && normal.y <= 0.0 {
        -angle
    } else {
        angle
    }
}

impl LineStyle {
    /// Creates a style with the given stroke color and width.
    pub fn new(color: Color, width: f32) -> Self {
        Self {
            width,
            color,
            ..Self::default()
        }
    }

    /// Stroke width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Sets the stroke width.
    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    /// Stroke color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Sets the stroke color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// End-cap policy.
    pub fn cap(&self) -> CapKind {
        self.cap
    }

    /// Sets the end-cap policy.
    pub fn set_cap(&mut self, cap: CapKind) {
        self.cap = cap;
    }

    /// Join policy.
    pub fn join(&self) -> JoinKind {
        self.join
    }

    /// Sets the join policy.
    pub fn set_join(&mut self, join: JoinKind) {
        self.join = join;
    }

    /// Triangle count used by round caps and joins.
    pub fn segment_count(&self) -> u8 {
        self.segment_count
    }

    /// Sets the triangle count of round caps and joins.
    pub fn set_segment_count(&mut self, count: u8) {
        self.segment_count = count;
    }

    /// Exact number of vertices one end cap emits.
    pub fn cap_vertex_count(&self) -> usize {
        match self.cap {
            CapKind::Butt => 0,
            CapKind::Round => 3 * self.segment_count as usize,
            CapKind::Square => 4,
        }
    }

    /// Exact number of vertices one interior join emits.
    pub fn join_vertex_count(&self) -> usize {
        match self.join {
            JoinKind::Miter => 6,
            JoinKind::Round => 3 * self.segment_count as usize,
            JoinKind::Bevel => 3,
        }
    }

    /// Emits an end cap at `point`. For the cap at the line's end the caller
    /// must pass the segment normal with its sign reversed to keep the
    /// winding consistent.
    pub fn add_cap(
        &self,
        point: RenderPoint,
        normal: Normal,
        z: f32,
        mut index: u32,
        buffer: &mut GeometryBuffer,
    ) -> u32 {
        match self.cap {
            CapKind::Butt => {}
            CapKind::Round => {
                let start = angle_of(normal);
                let end = start + PI;
                let step = (end - start) / self.segment_count as f32;
                let mut current = start;
                for _ in 0..self.segment_count {
                    push_vertex(buffer, point, z, Normal::new(current.cos(), current.sin()));
                    current += step;
                    push_vertex(buffer, point, z, Normal::new(current.cos(), current.sin()));
                    push_vertex(buffer, point, z, Normal::new(0.0, 0.0));

                    for _ in 0..3 {
                        buffer.add_index(index as u16);
                        index += 1;
                    }
                }
            }
            CapKind::Square => {
                // Two corners pushed out along the segment direction, the
                // other two on the butt edge.
                push_vertex(
                    buffer,
                    point,
                    z,
                    Normal::new(-(normal.y + normal.x), -(normal.y - normal.x)),
                );
                push_vertex(
                    buffer,
                    point,
                    z,
                    Normal::new(normal.x - normal.y, normal.x + normal.y),
                );
                push_vertex(buffer, point, z, Normal::new(-normal.x, -normal.y));
                push_vertex(buffer, point, z, Normal::new(normal.x, normal.y));

                for offset in [0, 1, 2, 3, 2, 1] {
                    buffer.add_index((index + offset) as u16);
                }
                index += 4;
            }
        }

        index
    }

    /// Emits a join at an interior `point` between the segments with
    /// `prev_normal` and `normal`.
    pub fn add_join(
        &self,
        point: RenderPoint,
        prev_normal: Normal,
        normal: Normal,
        z: f32,
        mut index: u32,
        buffer: &mut GeometryBuffer,
    ) -> u32 {
        let start = angle_of(prev_normal);
        let end = angle_of(normal);
        let sweep = end - start;
        // The turn direction decides which side of the line the wedge is on.
        let mult: f32 = if sweep >= 0.0 { -1.0 } else { 1.0 };

        match self.join {
            JoinKind::Round => {
                let step = sweep / self.segment_count as f32;
                let mut current = start;
                for _ in 0..self.segment_count {
                    push_vertex(
                        buffer,
                        point,
                        z,
                        Normal::new(current.cos() * mult, current.sin() * mult),
                    );
                    current += step;
                    push_vertex(
                        buffer,
                        point,
                        z,
                        Normal::new(current.cos() * mult, current.sin() * mult),
                    );
                    push_vertex(buffer, point, z, Normal::new(0.0, 0.0));

                    for _ in 0..3 {
                        buffer.add_index(index as u16);
                        index += 1;
                    }
                }
            }
            JoinKind::Miter => {
                let mut miter = prev_normal + normal;
                let cos_half_angle = miter.dot(&normal);
                // Antiparallel normals would divide by zero; the miter
                // degenerates to zero length there.
                let miter_length = if cos_half_angle.abs() < EPSILON {
                    0.0
                } else {
                    1.0 / cos_half_angle
                };
                miter *= miter_length;

                push_vertex(buffer, point, z, prev_normal * mult);
                push_vertex(buffer, point, z, miter * mult);
                push_vertex(buffer, point, z, Normal::new(0.0, 0.0));

                push_vertex(buffer, point, z, normal * mult);
                push_vertex(buffer, point, z, miter * mult);
                push_vertex(buffer, point, z, Normal::new(0.0, 0.0));

                for _ in 0..6 {
                    buffer.add_index(index as u16);
                    index += 1;
                }
            }
            JoinKind::Bevel => {
                push_vertex(buffer, point, z, prev_normal * mult);
                push_vertex(buffer, point, z, normal * mult);
                push_vertex(buffer, point, z, Normal::new(0.0, 0.0));

                for _ in 0..3 {
                    buffer.add_index(index as u16);
                    index += 1;
                }
            }
        }

        index
    }

    /// Emits one ribbon quad between `p1` and `p2`: 4 vertices, 6 indices.
    pub fn add_segment(
        &self,
        p1: RenderPoint,
        p2: RenderPoint,
        normal: Normal,
        z: f32,
        mut index: u32,
        buffer: &mut GeometryBuffer,
    ) -> u32 {
        push_vertex(buffer, p1, z, -normal);
        buffer.add_index(index as u16);
        index += 1;

        push_vertex(buffer, p2, z, -normal);
        buffer.add_index(index as u16);
        index += 1;

        push_vertex(buffer, p1, z, normal);
        buffer.add_index(index as u16);
        index += 1;

        push_vertex(buffer, p2, z, normal);
        buffer.add_index((index - 2) as u16);
        buffer.add_index((index - 1) as u16);
        buffer.add_index(index as u16);
        index += 1;

        index
    }
}

fn push_vertex(buffer: &mut GeometryBuffer, point: RenderPoint, z: f32, normal: Normal) {
    buffer.add_vertex(point.x);
    buffer.add_vertex(point.y);
    buffer.add_vertex(z);
    buffer.add_vertex(normal.x);
    buffer.add_vertex(normal.y);
}
