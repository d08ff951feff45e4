//! Tessella is a tiled map rendering core. It converts vector features and
//! raster windows into GPU-ready geometry buffers, styled by a pluggable
//! style system, and caches the result per tile for a render thread to
//! consume.
//!
//! # Main components
//!
//! * [`render::GeometryBuffer`] is append-only vertex/index storage with a
//!   hard 16-bit-index capacity. Fill code checks capacity before every
//!   emission and seals full buffers into a [`render::BufferArray`].
//! * [`style::Style`] is a tagged variant over rendering capabilities
//!   (points, lines, fills, markers, imagery) whose parameter structs carry
//!   the tessellation and draw parameters. Styles persist as JSON trees.
//! * [`layer::FeatureLayer`] is the tile fill engine: it fetches a tile's
//!   features from a [`layer::FeatureSource`], tessellates them per the
//!   active style and stores the buffers in the per-layer tile cache.
//! * [`layer::RasterLayer`] is the raster path: it reads a decimated pixel
//!   window through a [`layer::RasterSource`] and caches one textured quad
//!   per tile.
//!
//! Worker threads fill tiles while a single render thread draws them; each
//! layer's cache sits behind a mutex with a bounded acquisition timeout, and
//! a timeout is a signal to retry later rather than an error.
//!
//! The crate draws nothing itself: filled buffers are handed to a
//! [`render::RenderBackend`] implementation supplied by the embedding
//! application.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod cartesian;
mod color;
pub mod error;
pub mod layer;
pub mod render;
pub mod style;
mod tile;

pub use color::Color;
pub use error::TessellaError;
pub use tile::{RenderTile, TileIndex};
