//! Vector feature layer: converts a tile's feature geometries into geometry
//! buffers according to the active style.

use ahash::HashSet;
use log::warn;
use parking_lot::Mutex;

use crate::cartesian::{segment_normal, Extent, Normal, RenderPoint};
use crate::layer::{TileStore, TiledLayer, DEFAULT_LOCK_TIMEOUT};
use crate::render::buffer::{
    BufferArray, BufferKind, BufferWriter, MAX_INDEX_COUNT, MAX_VERTEX_COUNT,
};
use crate::render::RenderBackend;
use crate::style::line::{LineStyle, SEGMENT_VERTEX_COUNT};
use crate::style::point::PointTessellator;
use crate::style::{RenderType, Style};
use crate::tile::{RenderTile, TileIndex};

/// Geometry kind of a feature class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeometryType {
    /// Point or multi-point features.
    Point,
    /// Line or multi-line features.
    Line,
    /// Polygon or multi-polygon features.
    Polygon,
}

/// The feature-class collaborator a vector layer reads its data from.
pub trait FeatureSource: Send + Sync {
    /// Returns the tile's features clipped to `extent`. May be empty.
    fn tile(&self, index: TileIndex, extent: Extent) -> VectorTile;

    /// Geometry kind of the features this source produces.
    fn geometry_type(&self) -> GeometryType;
}

/// One feature's geometry within a tile. Immutable once produced by the
/// feature source.
#[derive(Debug, Clone)]
pub struct VectorTileItem {
    ids: Vec<i64>,
    points: Vec<RenderPoint>,
    indices: Vec<u16>,
    border_rings: Vec<Vec<u16>>,
    closed: bool,
}

impl VectorTileItem {
    /// Assembles an item from its parts: source feature ids, the point
    /// sequence, the triangulation index list for polygons, border rings as
    /// index lists into `points`, and whether a line geometry is closed.
    pub fn new(
        ids: Vec<i64>,
        points: Vec<RenderPoint>,
        indices: Vec<u16>,
        border_rings: Vec<Vec<u16>>,
        closed: bool,
    ) -> Self {
        Self {
            ids,
            points,
            indices,
            border_rings,
            closed,
        }
    }

    /// Feature ids this geometry belongs to.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// The ordered point sequence.
    pub fn points(&self) -> &[RenderPoint] {
        &self.points
    }

    /// Point at position `i`.
    pub fn point(&self, i: usize) -> RenderPoint {
        self.points[i]
    }

    /// Number of points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Triangulation indices of a polygon interior.
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Border rings of a polygon, as index lists into the point sequence.
    pub fn border_rings(&self) -> &[Vec<u16>] {
        &self.border_rings
    }

    /// Whether a line geometry closes on itself.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn has_any_id(&self, set: &HashSet<i64>) -> bool {
        !set.is_empty() && self.ids.iter().any(|id| set.contains(id))
    }
}

/// Features of one tile, as returned by the feature source.
#[derive(Debug, Default, Clone)]
pub struct VectorTile {
    items: Vec<VectorTileItem>,
}

impl VectorTile {
    /// Wraps a set of tile items.
    pub fn new(items: Vec<VectorTileItem>) -> Self {
        Self { items }
    }

    /// The tile's items.
    pub fn items(&self) -> &[VectorTileItem] {
        &self.items
    }

    /// Whether the tile contains no geometry.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Buffers filled for one tile: the normal draw stream and the parallel
/// stream of selected features.
#[derive(Debug, Default)]
pub struct VectorTileData {
    draw: BufferArray,
    selection: BufferArray,
}

impl VectorTileData {
    /// Buffers of unselected features.
    pub fn draw_buffers(&self) -> &BufferArray {
        &self.draw
    }

    /// Buffers of selected features.
    pub fn selection_buffers(&self) -> &BufferArray {
        &self.selection
    }
}

/// A renderable vector layer over a feature source.
pub struct FeatureLayer<S> {
    source: S,
    style: Style,
    selection_style: Option<Style>,
    old_styles: Mutex<Vec<Style>>,
    visible: bool,
    selectable: bool,
    hidden_ids: HashSet<i64>,
    selected_ids: HashSet<i64>,
    tiles: TileStore<VectorTileData>,
}

impl<S: FeatureSource> FeatureLayer<S> {
    /// Creates a layer with the default style for the source's geometry
    /// kind.
    pub fn new(source: S) -> Self {
        let style = Style::default_for(source.geometry_type());
        Self {
            source,
            style,
            selection_style: None,
            old_styles: Mutex::new(Vec::new()),
            visible: true,
            selectable: false,
            hidden_ids: HashSet::default(),
            selected_ids: HashSet::default(),
            tiles: TileStore::new(DEFAULT_LOCK_TIMEOUT),
        }
    }

    /// The active style.
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Replaces the active style. The old style is queued and destroyed on
    /// the next cache eviction so in-flight draws stay valid.
    pub fn set_style(&mut self, style: Style) {
        let old = std::mem::replace(&mut self.style, style);
        self.old_styles.lock().push(old);
    }

    /// Style selected features are drawn with.
    pub fn set_selection_style(&mut self, style: Option<Style>) {
        self.selection_style = style;
    }

    /// Whether the layer is drawn at all.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether features can be routed to the selection stream.
    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    /// Hides the given feature ids from rendering.
    pub fn set_hidden_ids(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.hidden_ids = ids.into_iter().collect();
    }

    /// Marks the given feature ids as selected.
    pub fn set_selected_ids(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.selected_ids = ids.into_iter().collect();
    }

    /// Changes the bound on tile-cache lock acquisition.
    pub fn set_lock_timeout(&mut self, timeout: std::time::Duration) {
        self.tiles.set_timeout(timeout);
    }

    fn is_selected(&self, item: &VectorTileItem) -> bool {
        self.selectable && item.has_any_id(&self.selected_ids)
    }

    fn fill_points(&self, tile: &VectorTile, z: f32) -> Option<VectorTileData> {
        let style = point_tessellator(&self.style)?;
        let selection_style = self
            .selection_style
            .as_ref()
            .and_then(point_tessellator)
            .unwrap_or(style);

        let mut draw = BufferWriter::new(style.buffer_kind());
        let mut selection = BufferWriter::new(selection_style.buffer_kind());

        for item in tile.items() {
            if item.has_any_id(&self.hidden_ids) {
                continue;
            }
            if item.point_count() < 1 {
                continue;
            }

            let (writer, style) = if self.is_selected(item) {
                (&mut selection, selection_style)
            } else {
                (&mut draw, style)
            };

            for i in 0..item.point_count() {
                let pt = item.point(i);
                writer.emit(style.vertex_count(), |index, buffer| {
                    style.add_point(pt, z, index, buffer)
                });
            }
        }

        Some(VectorTileData {
            draw: draw.finish(),
            selection: selection.finish(),
        })
    }

    fn fill_lines(&self, tile: &VectorTile, z: f32) -> Option<VectorTileData> {
        let style = line_style(&self.style)?;
        let selection_style = self
            .selection_style
            .as_ref()
            .and_then(line_style)
            .unwrap_or(style);

        let mut draw = BufferWriter::new(BufferKind::Line);
        let mut selection = BufferWriter::new(BufferKind::Line);

        for item in tile.items() {
            if item.has_any_id(&self.hidden_ids) {
                continue;
            }
            if item.point_count() < 2 {
                continue;
            }

            let (writer, style) = if self.is_selected(item) {
                (&mut selection, selection_style)
            } else {
                (&mut draw, style)
            };

            let closed = item.is_closed();
            let mut prev_normal = Normal::zeros();

            for i in 0..item.point_count() - 1 {
                let p1 = item.point(i);
                let p2 = item.point(i + 1);
                let normal = segment_normal(p1, p2);

                if !closed {
                    if i == 0 {
                        writer.emit(style.cap_vertex_count(), |index, buffer| {
                            style.add_cap(p1, normal, z, index, buffer)
                        });
                    }
                    if i == item.point_count() - 2 {
                        // The closing cap faces the other way.
                        writer.emit(style.cap_vertex_count(), |index, buffer| {
                            style.add_cap(p2, -normal, z, index, buffer)
                        });
                    }
                }

                if i != 0 {
                    writer.emit(style.join_vertex_count(), |index, buffer| {
                        style.add_join(p1, prev_normal, normal, z, index, buffer)
                    });
                }

                writer.emit(SEGMENT_VERTEX_COUNT, |index, buffer| {
                    style.add_segment(p1, p2, normal, z, index, buffer)
                });
                prev_normal = normal;
            }
        }

        Some(VectorTileData {
            draw: draw.finish(),
            selection: selection.finish(),
        })
    }

    fn fill_polygons(&self, tile: &VectorTile, z: f32) -> Option<VectorTileData> {
        let (_, border_style) = fill_styles(&self.style)?;
        // Fill colors only matter at draw time; tessellation needs just the
        // border parameters of the selection style.
        let selection_border = self
            .selection_style
            .as_ref()
            .and_then(fill_styles)
            .map(|(_, border)| border)
            .unwrap_or(border_style);

        let mut draw_fill = BufferWriter::new(BufferKind::Fill);
        let mut draw_border = BufferWriter::new(BufferKind::Line);
        let mut sel_fill = BufferWriter::new(BufferKind::Fill);
        let mut sel_border = BufferWriter::new(BufferKind::Line);

        for item in tile.items() {
            if item.has_any_id(&self.hidden_ids) {
                continue;
            }

            let points = item.points();
            if points.len() < 3 {
                continue;
            }
            if points.len() > MAX_VERTEX_COUNT || item.indices().len() > MAX_INDEX_COUNT {
                warn!(
                    "skipping oversized polygon of {} vertices / {} indices in tile fill",
                    points.len(),
                    item.indices().len()
                );
                continue;
            }

            let (fill_writer, border_writer, border) = if self.is_selected(item) {
                (&mut sel_fill, &mut sel_border, selection_border)
            } else {
                (&mut draw_fill, &mut draw_border, border_style)
            };

            // Interior: the collaborator-supplied triangulation indexes the
            // appended point run, offset by the buffer-local base.
            fill_writer.emit(points.len(), |base, buffer| {
                for point in points {
                    buffer.add_vertex(point.x);
                    buffer.add_vertex(point.y);
                    buffer.add_vertex(z);
                }
                for &index in item.indices() {
                    buffer.add_index((base + index as u32) as u16);
                }
                base + points.len() as u32
            });

            let Some(border) = border else {
                continue;
            };

            for ring in item.border_rings() {
                if ring.len() < 2 {
                    continue;
                }
                if ring.iter().any(|&i| i as usize >= points.len()) {
                    warn!("skipping polygon border ring with out-of-range indices");
                    continue;
                }

                let mut prev_normal = Normal::zeros();
                let mut first_normal: Option<Normal> = None;

                for i in 0..ring.len() - 1 {
                    let p1 = points[ring[i] as usize];
                    let p2 = points[ring[i + 1] as usize];
                    let normal = segment_normal(p1, p2);

                    if i == ring.len() - 2 {
                        // Close the ring: join the last segment back into
                        // the first one.
                        let start_normal = first_normal.unwrap_or(-normal);
                        border_writer.emit(border.join_vertex_count(), |index, buffer| {
                            border.add_join(p2, start_normal, -normal, z, index, buffer)
                        });
                    }

                    if i != 0 {
                        border_writer.emit(border.join_vertex_count(), |index, buffer| {
                            border.add_join(p1, prev_normal, normal, z, index, buffer)
                        });
                    }

                    border_writer.emit(SEGMENT_VERTEX_COUNT, |index, buffer| {
                        border.add_segment(p1, p2, normal, z, index, buffer)
                    });

                    prev_normal = normal;
                    if first_normal.is_none() {
                        first_normal = Some(-normal);
                    }
                }
            }
        }

        let mut draw = draw_fill.finish();
        for buffer in draw_border.finish().into_buffers() {
            draw.push(buffer);
        }
        let mut selection = sel_fill.finish();
        for buffer in sel_border.finish().into_buffers() {
            selection.push(buffer);
        }

        Some(VectorTileData { draw, selection })
    }

    fn draw_array(
        &self,
        array: &mut BufferArray,
        style: &Style,
        backend: &mut dyn RenderBackend,
    ) -> bool {
        for buffer in array.buffers_mut() {
            if buffer.is_empty() {
                continue;
            }
            if buffer.bind(backend).is_err() {
                return false;
            }
            if let Some(paint) = style.paint_for(buffer.kind()) {
                backend.draw_elements(&paint, buffer);
            }
        }

        true
    }

    /// Draws the selection stream of `tile` with the selection style.
    ///
    /// Same readiness contract as [`TiledLayer::draw`].
    pub fn draw_selection(&self, tile: &RenderTile, backend: &mut dyn RenderBackend) -> bool {
        let Some(style) = self.selection_style.as_ref() else {
            return true;
        };

        let Ok(mut tiles) = self.tiles.lock() else {
            return false;
        };
        let Some(entry) = tiles.get_mut(&tile.index()) else {
            return false;
        };
        let Some(data) = entry.as_mut() else {
            return true;
        };

        self.draw_array(&mut data.selection, style, backend)
    }
}

impl<S: FeatureSource> TiledLayer for FeatureLayer<S> {
    fn fill(&self, tile: &RenderTile, z: f32, _is_last_try: bool) -> bool {
        if !self.visible {
            return self.tiles.store(tile.index(), None).is_ok();
        }

        let vtile = self.source.tile(tile.index(), tile.extent());
        if vtile.is_empty() {
            return self.tiles.store(tile.index(), None).is_ok();
        }

        let data = match self.style.render_type() {
            RenderType::Point => self.fill_points(&vtile, z),
            RenderType::Line => self.fill_lines(&vtile, z),
            RenderType::Fill => self.fill_polygons(&vtile, z),
            // Rasters have their own path; an image style has nothing to
            // tessellate.
            RenderType::Image => return true,
        };

        self.tiles.store(tile.index(), data).is_ok()
    }

    fn draw(&self, tile: &RenderTile, backend: &mut dyn RenderBackend) -> bool {
        let Ok(mut tiles) = self.tiles.lock() else {
            return false;
        };
        let Some(entry) = tiles.get_mut(&tile.index()) else {
            // Data not yet loaded.
            return false;
        };
        let Some(data) = entry.as_mut() else {
            // Nothing to draw for this tile.
            return true;
        };

        self.draw_array(&mut data.draw, &self.style, backend)
    }

    fn free(&self, tile: &RenderTile) {
        let Ok(mut tiles) = self.tiles.lock() else {
            return;
        };
        tiles.remove(&tile.index());
        self.old_styles.lock().clear();
    }
}

fn point_tessellator(style: &Style) -> Option<&dyn PointTessellator> {
    match style {
        Style::Point(style) => Some(style),
        Style::Marker(style) => Some(style),
        _ => None,
    }
}

fn line_style(style: &Style) -> Option<&LineStyle> {
    match style {
        Style::Line(style) => Some(style),
        _ => None,
    }
}

fn fill_styles(style: &Style) -> Option<(&crate::style::FillStyle, Option<&LineStyle>)> {
    match style {
        Style::Fill(fill) => Some((fill, None)),
        Style::FillBordered(style) => Some((&style.fill, Some(&style.border))),
        _ => None,
    }
}
