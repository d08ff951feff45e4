//! Raster layer: reads decimated pixel windows from a raster source and
//! caches one textured quad per tile.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::cartesian::Extent;
use crate::layer::{TileStore, TiledLayer, DEFAULT_LOCK_TIMEOUT};
use crate::render::buffer::{BufferKind, GeometryBuffer};
use crate::render::{ImagePaint, Paint, RasterImage, RenderBackend};
use crate::style::{ImageStyle, Style};
use crate::tile::RenderTile;

/// Pixel-space read window into a raster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PixelWindow {
    /// Leftmost column.
    pub min_x: usize,
    /// Topmost row.
    pub min_y: usize,
    /// Window width in pixels.
    pub width: usize,
    /// Window height in pixels.
    pub height: usize,
}

/// Which source bands feed the RGBA output. Band numbers are 1-based;
/// `alpha == 0` means the source has no alpha band and the output is opaque.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BandMapping {
    /// Red channel source band.
    pub red: usize,
    /// Green channel source band.
    pub green: usize,
    /// Blue channel source band.
    pub blue: usize,
    /// Alpha channel source band, 0 when absent.
    pub alpha: usize,
}

impl Default for BandMapping {
    fn default() -> Self {
        Self {
            red: 1,
            green: 2,
            blue: 3,
            alpha: 0,
        }
    }
}

/// The raster collaborator a raster layer reads pixels from.
pub trait RasterSource: Send + Sync {
    /// World extent of the raster.
    fn extent(&self) -> Extent;

    /// Raster width in pixels.
    fn width(&self) -> usize;

    /// Raster height in pixels.
    fn height(&self) -> usize;

    /// Number of bands in the source.
    fn band_count(&self) -> usize;

    /// Affine pixel-to-world transform, `None` when the raster lives in
    /// plain row/column space.
    fn geo_transform(&self) -> Option<[f64; 6]>;

    /// Adjusts `window` and `out_size` to the decimation level best
    /// matching the requested output. Supplied by the source; not
    /// recomputed here.
    fn best_overview(&self, window: &mut PixelWindow, out_size: &mut (usize, usize));

    /// Reads `window` decimated to `out_size` into an RGBA byte buffer.
    /// Returns `false` when the source data cannot be read.
    fn pixel_data(
        &self,
        buffer: &mut [u8],
        window: PixelWindow,
        out_size: (usize, usize),
        bands: BandMapping,
    ) -> bool;
}

/// Cached render data of one raster tile.
#[derive(Debug)]
struct RasterTileData {
    quad: GeometryBuffer,
    image: Arc<RasterImage>,
}

/// A renderable raster layer over a raster source.
pub struct RasterLayer<R> {
    source: R,
    style: Style,
    old_styles: Mutex<Vec<Style>>,
    visible: bool,
    bands: BandMapping,
    transparency: u8,
    tiles: TileStore<RasterTileData>,
}

impl<R: RasterSource> RasterLayer<R> {
    /// Creates a layer over the given source. Sources with four bands get
    /// the fourth mapped to alpha.
    pub fn new(source: R) -> Self {
        let mut bands = BandMapping::default();
        if source.band_count() == 4 {
            bands.alpha = 4;
        }

        Self {
            source,
            style: Style::Image(ImageStyle::default()),
            old_styles: Mutex::new(Vec::new()),
            visible: true,
            bands,
            transparency: 0,
            tiles: TileStore::new(DEFAULT_LOCK_TIMEOUT),
        }
    }

    /// The active style.
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Replaces the active style, queueing the old one for destruction on
    /// the next cache eviction.
    pub fn set_style(&mut self, style: Style) {
        let old = std::mem::replace(&mut self.style, style);
        self.old_styles.lock().push(old);
    }

    /// Whether the layer is drawn at all.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Sets the band mapping.
    pub fn set_bands(&mut self, bands: BandMapping) {
        self.bands = bands;
    }

    /// Sets the opacity reduction applied to alpha-less sources.
    pub fn set_transparency(&mut self, transparency: u8) {
        self.transparency = transparency;
    }

    /// Changes the bound on tile-cache lock acquisition.
    pub fn set_lock_timeout(&mut self, timeout: std::time::Duration) {
        self.tiles.set_timeout(timeout);
    }

    /// Pixel window covering `world` given the source's geo-transform.
    fn pixel_window(&self, world: &Extent) -> Option<PixelWindow> {
        let mut px = match self.source.geo_transform() {
            Some(gt) => {
                let inverse = invert_geo_transform(&gt)?;
                let (x0, y0) = apply_geo_transform(&inverse, world.min_x(), world.min_y());
                let (x1, y1) = apply_geo_transform(&inverse, world.max_x(), world.max_y());
                Extent::new(x0, y0, x1, y1)
            }
            // Plain row/column space: rows count from the top.
            None => Extent::new(
                world.min_x(),
                self.source.height() as f64 - world.max_y(),
                world.max_x(),
                self.source.height() as f64 - world.min_y(),
            ),
        };
        px.fix();

        let min_x = px.min_x().floor().max(0.0) as usize;
        let min_y = px.min_y().floor().max(0.0) as usize;
        let width = (px.width().ceil() as usize).min(self.source.width().saturating_sub(min_x));
        let height = (px.height().ceil() as usize).min(self.source.height().saturating_sub(min_y));

        if width == 0 || height == 0 {
            return None;
        }

        Some(PixelWindow {
            min_x,
            min_y,
            width,
            height,
        })
    }

    fn build_quad(extent: &Extent, z: f32) -> GeometryBuffer {
        let mut quad = GeometryBuffer::new(BufferKind::Texture);

        let corners = [
            (extent.min_x(), extent.min_y(), 0.0, 1.0),
            (extent.min_x(), extent.max_y(), 0.0, 0.0),
            (extent.max_x(), extent.max_y(), 1.0, 0.0),
            (extent.max_x(), extent.min_y(), 1.0, 1.0),
        ];
        for (x, y, u, v) in corners {
            quad.add_vertex(x as f32);
            quad.add_vertex(y as f32);
            quad.add_vertex(z);
            quad.add_vertex(0.0);
            quad.add_vertex(0.0);
            quad.add_vertex(u);
            quad.add_vertex(v);
        }
        for index in [0u16, 1, 2, 0, 2, 3] {
            quad.add_index(index);
        }

        quad
    }
}

impl<R: RasterSource> TiledLayer for RasterLayer<R> {
    fn fill(&self, tile: &RenderTile, z: f32, is_last_try: bool) -> bool {
        if !self.visible {
            return self.tiles.store(tile.index(), None).is_ok();
        }

        // Already filled; raster reads are expensive enough to skip.
        match self.tiles.lock() {
            Ok(tiles) => {
                if tiles.contains_key(&tile.index()) {
                    return true;
                }
            }
            Err(_) => return false,
        }

        let tile_extent = tile.extent();
        let intersection = self.source.extent().intersection(&tile_extent);
        if !intersection.is_valid() {
            debug!("raster does not intersect tile {:?}", tile.index());
            return self.tiles.store(tile.index(), None).is_ok();
        }

        let Some(mut window) = self.pixel_window(&intersection) else {
            return self.tiles.store(tile.index(), None).is_ok();
        };

        let mut out_size = (
            ((intersection.width() * tile.size_px() as f64 / tile_extent.width()).ceil()
                as usize)
                .max(1),
            ((intersection.height() * tile.size_px() as f64 / tile_extent.height()).ceil()
                as usize)
                .max(1),
        );

        let mut smooth = false;
        if out_size.0 >= window.width && out_size.1 >= window.height {
            // The screen asks for more pixels than the window holds; read
            // the source resolution as-is.
            out_size = (window.width, window.height);
            smooth = true;
        } else {
            self.source.best_overview(&mut window, &mut out_size);
        }

        let fill_byte = if self.bands.alpha == 0 {
            255 - self.transparency
        } else {
            0
        };
        let mut data = vec![fill_byte; out_size.0 * out_size.1 * 4];

        if !self
            .source
            .pixel_data(&mut data, window, out_size, self.bands)
        {
            if is_last_try {
                // Give up on this tile instead of retrying forever.
                return self.tiles.store(tile.index(), None).is_ok();
            }

            debug!("raster read failed for tile {:?}, will retry", tile.index());
            return false;
        }

        let image = Arc::new(RasterImage::new(data, out_size.0, out_size.1, smooth));
        let quad = Self::build_quad(&intersection, z);

        self.tiles
            .store(tile.index(), Some(RasterTileData { quad, image }))
            .is_ok()
    }

    fn draw(&self, tile: &RenderTile, backend: &mut dyn RenderBackend) -> bool {
        let Ok(mut tiles) = self.tiles.lock() else {
            return false;
        };
        let Some(entry) = tiles.get_mut(&tile.index()) else {
            return false;
        };
        let Some(data) = entry.as_mut() else {
            return true;
        };

        if data.quad.bind(backend).is_err() {
            return false;
        }

        let paint = Paint::Image(ImagePaint {
            image: data.image.clone(),
        });
        backend.draw_elements(&paint, &data.quad);

        true
    }

    fn free(&self, tile: &RenderTile) {
        let Ok(mut tiles) = self.tiles.lock() else {
            return;
        };
        tiles.remove(&tile.index());
        self.old_styles.lock().clear();
    }
}

fn apply_geo_transform(gt: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (gt[0] + x * gt[1] + y * gt[2], gt[3] + x * gt[4] + y * gt[5])
}

fn invert_geo_transform(gt: &[f64; 6]) -> Option<[f64; 6]> {
    let det = gt[1] * gt[5] - gt[2] * gt[4];
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;

    Some([
        (gt[2] * gt[3] - gt[0] * gt[5]) * inv_det,
        gt[5] * inv_det,
        -gt[2] * inv_det,
        (-gt[1] * gt[3] + gt[0] * gt[4]) * inv_det,
        -gt[4] * inv_det,
        gt[1] * inv_det,
    ])
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use approx::assert_relative_eq;

    use super::*;
    use crate::render::tests::RecordingBackend;
    use crate::tile::TileIndex;

    struct TestRaster {
        extent: Extent,
        size: (usize, usize),
        fail_reads: bool,
        reads: AtomicUsize,
    }

    impl TestRaster {
        fn new() -> Self {
            Self {
                extent: Extent::new(0.0, 0.0, 100.0, 100.0),
                size: (100, 100),
                fail_reads: false,
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl RasterSource for TestRaster {
        fn extent(&self) -> Extent {
            self.extent
        }

        fn width(&self) -> usize {
            self.size.0
        }

        fn height(&self) -> usize {
            self.size.1
        }

        fn band_count(&self) -> usize {
            3
        }

        fn geo_transform(&self) -> Option<[f64; 6]> {
            None
        }

        fn best_overview(&self, _window: &mut PixelWindow, _out_size: &mut (usize, usize)) {}

        fn pixel_data(
            &self,
            buffer: &mut [u8],
            _window: PixelWindow,
            _out_size: (usize, usize),
            _bands: BandMapping,
        ) -> bool {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return false;
            }
            buffer.fill(128);
            true
        }
    }

    fn tile(extent: Extent) -> RenderTile {
        RenderTile::new(TileIndex::new(0, 0, 0), extent, 256)
    }

    #[test]
    fn intersecting_tile_fills_and_draws_one_quad() {
        let layer = RasterLayer::new(TestRaster::new());
        let tile = tile(Extent::new(50.0, 50.0, 150.0, 150.0));

        assert!(layer.fill(&tile, 0.0, false));

        let mut backend = RecordingBackend::default();
        assert!(layer.draw(&tile, &mut backend));
        assert_eq!(backend.uploads, 1);
        assert_eq!(backend.draws, vec![(BufferKind::Texture, 6)]);
    }

    #[test]
    fn quad_covers_the_intersection() {
        let quad = RasterLayer::<TestRaster>::build_quad(
            &Extent::new(50.0, 50.0, 100.0, 100.0),
            0.0,
        );

        assert_eq!(quad.vertex_count(), 4);
        // First corner is (min_x, min_y) with the lower-left uv.
        assert_relative_eq!(quad.vertices()[0], 50.0);
        assert_relative_eq!(quad.vertices()[1], 50.0);
        assert_relative_eq!(quad.vertices()[5], 0.0);
        assert_relative_eq!(quad.vertices()[6], 1.0);
    }

    #[test]
    fn non_intersecting_tile_caches_null() {
        let layer = RasterLayer::new(TestRaster::new());
        let tile = tile(Extent::new(500.0, 500.0, 600.0, 600.0));

        assert!(layer.fill(&tile, 0.0, false));

        let mut backend = RecordingBackend::default();
        assert!(layer.draw(&tile, &mut backend));
        assert!(backend.draws.is_empty());
    }

    #[test]
    fn failed_read_retries_until_last_try() {
        let mut raster = TestRaster::new();
        raster.fail_reads = true;
        let layer = RasterLayer::new(raster);
        let tile = tile(Extent::new(0.0, 0.0, 100.0, 100.0));

        // Transient failure: nothing cached, the scheduler will re-request.
        assert!(!layer.fill(&tile, 0.0, false));
        let mut backend = RecordingBackend::default();
        assert!(!layer.draw(&tile, &mut backend));

        // Last try gives up and caches the empty result.
        assert!(layer.fill(&tile, 0.0, true));
        assert!(layer.draw(&tile, &mut backend));
        assert!(backend.draws.is_empty());
    }

    #[test]
    fn filled_tile_is_not_read_again() {
        let layer = RasterLayer::new(TestRaster::new());
        let tile = tile(Extent::new(0.0, 0.0, 100.0, 100.0));

        assert!(layer.fill(&tile, 0.0, false));
        assert!(layer.fill(&tile, 0.0, false));
        assert_eq!(layer.source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invisible_layer_caches_null_without_reading() {
        let mut layer = RasterLayer::new(TestRaster::new());
        layer.set_visible(false);
        let tile = tile(Extent::new(0.0, 0.0, 100.0, 100.0));

        assert!(layer.fill(&tile, 0.0, false));
        assert_eq!(layer.source.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn geo_transform_inversion_roundtrips() {
        let gt = [10.0, 0.5, 0.0, 200.0, 0.0, -0.5];
        let inverse = invert_geo_transform(&gt).expect("not invertible");

        let (wx, wy) = apply_geo_transform(&gt, 20.0, 40.0);
        let (px, py) = apply_geo_transform(&inverse, wx, wy);
        assert_relative_eq!(px, 20.0, epsilon = 1e-9);
        assert_relative_eq!(py, 40.0, epsilon = 1e-9);
    }
}
