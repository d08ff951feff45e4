//! This example fills one tile from an in-memory feature source and draws it
//! through a render backend that prints what a GPU would receive.
//!
//! ```shell
//! cargo run --example fill_tile
//! ```

use tessella::cartesian::{Extent, RenderPoint};
use tessella::layer::{
    FeatureLayer, FeatureSource, GeometryType, TiledLayer, VectorTile, VectorTileItem,
};
use tessella::render::{GeometryBuffer, Paint, RenderBackend};
use tessella::style::{CapKind, JoinKind, LineStyle, Style};
use tessella::{Color, RenderTile, TessellaError, TileIndex};

struct Roads;

impl FeatureSource for Roads {
    fn tile(&self, _index: TileIndex, _extent: Extent) -> VectorTile {
        let path = (0..32)
            .map(|i| RenderPoint::new(i as f32 * 8.0, (i as f32 * 0.7).sin() * 40.0))
            .collect();
        VectorTile::new(vec![VectorTileItem::new(
            vec![1],
            path,
            Vec::new(),
            Vec::new(),
            false,
        )])
    }

    fn geometry_type(&self) -> GeometryType {
        GeometryType::Line
    }
}

struct PrintBackend;

impl RenderBackend for PrintBackend {
    fn upload_buffer(&mut self, buffer: &GeometryBuffer) -> Result<(), TessellaError> {
        println!(
            "uploaded {:?} buffer: {} vertices, {} indices",
            buffer.kind(),
            buffer.vertex_count(),
            buffer.index_count()
        );
        Ok(())
    }

    fn draw_elements(&mut self, paint: &Paint, buffer: &GeometryBuffer) {
        println!("drawing {} indices with {paint:?}", buffer.index_count());
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut layer = FeatureLayer::new(Roads);
    let mut style = LineStyle::new(Color::rgba(200, 60, 0, 255), 3.0);
    style.set_cap(CapKind::Round);
    style.set_join(JoinKind::Miter);
    layer.set_style(Style::Line(style));

    let tile = RenderTile::new(
        TileIndex::new(0, 0, 0),
        Extent::new(0.0, 0.0, 256.0, 256.0),
        256,
    );

    // A worker thread would fill the tile; the render thread draws it once
    // the cache entry appears.
    let mut backend = PrintBackend;
    while !layer.draw(&tile, &mut backend) {
        layer.fill(&tile, 0.0, false);
    }
}
