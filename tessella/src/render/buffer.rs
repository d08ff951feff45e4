//! Geometry buffers that tile filling packs vertex data into.

use crate::error::TessellaError;
use crate::render::RenderBackend;

/// Hard cap on the number of vertices a single buffer may hold. Indices are
/// 16 bits wide, so no vertex beyond this limit could be addressed.
pub const MAX_VERTEX_COUNT: usize = 1 << 16;

/// Cap on the index stream. An indexed emission writes at most two indices
/// per vertex (a ribbon quad is 4 vertices and 6 indices), so twice the
/// vertex cap always leaves room for one more emission that passed the
/// vertex-side check.
pub const MAX_INDEX_COUNT: usize = MAX_VERTEX_COUNT * 2;

/// Semantic kind of a geometry buffer. The kind fixes the interleaved vertex
/// layout and selects which part of a composite style draws the buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferKind {
    /// Point-shape geometry: x, y, z, nx, ny.
    Point,
    /// Line ribbon geometry: x, y, z, nx, ny.
    Line,
    /// Polygon interior geometry: x, y, z.
    Fill,
    /// Textured geometry: x, y, z, nx, ny, u, v.
    Texture,
}

impl BufferKind {
    /// Number of floats one vertex of this kind occupies.
    pub fn floats_per_vertex(&self) -> usize {
        match self {
            BufferKind::Point | BufferKind::Line => 5,
            BufferKind::Fill => 3,
            BufferKind::Texture => 7,
        }
    }
}

/// Append-only vertex/index buffer with a hard capacity.
///
/// Vertices are stored as an interleaved float stream whose layout is given
/// by the buffer [`kind`](GeometryBuffer::kind). Callers must check
/// [`can_store_vertices`](GeometryBuffer::can_store_vertices) before every
/// emission and seal the buffer into its parent array when it answers
/// `false`.
#[derive(Debug)]
pub struct GeometryBuffer {
    kind: BufferKind,
    vertices: Vec<f32>,
    indices: Vec<u16>,
    bound: bool,
}

impl GeometryBuffer {
    /// Creates an empty buffer of the given kind.
    pub fn new(kind: BufferKind) -> Self {
        Self {
            kind,
            vertices: Vec::new(),
            indices: Vec::new(),
            bound: false,
        }
    }

    /// The buffer's semantic kind.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Number of complete vertices currently stored.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.kind.floats_per_vertex()
    }

    /// Number of indices currently stored.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Whether the buffer has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Answers whether `amount` more vertices (and, if `indexed`, their
    /// indices) fit without the vertex count outgrowing the 16-bit index
    /// space.
    pub fn can_store_vertices(&self, amount: usize, indexed: bool) -> bool {
        if self.vertex_count() + amount > MAX_VERTEX_COUNT {
            return false;
        }

        !indexed || self.indices.len() + amount * 2 <= MAX_INDEX_COUNT
    }

    /// Appends one scalar to the interleaved vertex stream. A vertex of a
    /// 5-float layout takes five calls.
    pub fn add_vertex(&mut self, value: f32) {
        debug_assert!(!self.bound, "buffer mutated after bind");
        self.vertices.push(value);
    }

    /// Appends one index.
    pub fn add_index(&mut self, value: u16) {
        debug_assert!(!self.bound, "buffer mutated after bind");
        self.indices.push(value);
    }

    /// Raw vertex stream.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Raw index stream.
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Whether the buffer's data is resident on the render backend.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Uploads the buffer's data to the backend. A no-op when the buffer is
    /// already bound; the data must not change between binds.
    pub fn bind(&mut self, backend: &mut dyn RenderBackend) -> Result<(), TessellaError> {
        if self.bound {
            return Ok(());
        }

        backend.upload_buffer(self)?;
        self.bound = true;
        Ok(())
    }
}

/// Ordered collection of sealed buffers representing one tile's renderable
/// output for one semantic role.
#[derive(Debug, Default)]
pub struct BufferArray {
    buffers: Vec<GeometryBuffer>,
}

impl BufferArray {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sealed buffers in emission order.
    pub fn buffers(&self) -> &[GeometryBuffer] {
        &self.buffers
    }

    /// Mutable access for the draw path, which flips bind flags.
    pub fn buffers_mut(&mut self) -> &mut [GeometryBuffer] {
        &mut self.buffers
    }

    /// Total vertices across all buffers.
    pub fn vertex_count(&self) -> usize {
        self.buffers.iter().map(|b| b.vertex_count()).sum()
    }

    /// Appends a sealed buffer.
    pub fn push(&mut self, buffer: GeometryBuffer) {
        self.buffers.push(buffer);
    }

    /// Consumes the array, yielding its buffers.
    pub fn into_buffers(self) -> Vec<GeometryBuffer> {
        self.buffers
    }
}

/// Accumulates tessellation output into an arena of capacity-limited buffers.
///
/// The writer owns the buffer currently being filled and the running local
/// index counter. When an emission would not fit, the current buffer is
/// sealed into the array, a fresh one is started and the counter resets to 0.
#[derive(Debug)]
pub struct BufferWriter {
    array: BufferArray,
    current: GeometryBuffer,
    index: u32,
}

impl BufferWriter {
    /// Starts a writer producing buffers of the given kind.
    pub fn new(kind: BufferKind) -> Self {
        Self {
            array: BufferArray::new(),
            current: GeometryBuffer::new(kind),
            index: 0,
        }
    }

    /// Seals the current buffer if `vertices` more vertices would not fit.
    pub fn ensure_capacity(&mut self, vertices: usize, indexed: bool) {
        if !self.current.can_store_vertices(vertices, indexed) {
            let kind = self.current.kind();
            let full = std::mem::replace(&mut self.current, GeometryBuffer::new(kind));
            self.array.push(full);
            self.index = 0;
        }
    }

    /// Running vertex index local to the current buffer.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Runs one emission of exactly `vertices` vertices, sealing the current
    /// buffer first when they would not fit. The closure receives the local
    /// base index and the target buffer and returns the advanced index.
    pub fn emit(&mut self, vertices: usize, op: impl FnOnce(u32, &mut GeometryBuffer) -> u32) {
        self.ensure_capacity(vertices, true);
        self.index = op(self.index, &mut self.current);
    }

    /// Seals the current buffer and returns the finished array.
    pub fn finish(mut self) -> BufferArray {
        self.array.push(self.current);
        self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_accepts_full_capacity() {
        let buffer = GeometryBuffer::new(BufferKind::Line);
        assert!(buffer.can_store_vertices(MAX_VERTEX_COUNT, true));
        assert!(!buffer.can_store_vertices(MAX_VERTEX_COUNT + 1, true));
    }

    #[test]
    fn capacity_check_counts_existing_vertices() {
        let mut buffer = GeometryBuffer::new(BufferKind::Fill);
        for _ in 0..3 * 10 {
            buffer.add_vertex(0.0);
        }

        assert_eq!(buffer.vertex_count(), 10);
        assert!(buffer.can_store_vertices(MAX_VERTEX_COUNT - 10, false));
        assert!(!buffer.can_store_vertices(MAX_VERTEX_COUNT - 9, false));
    }

    #[test]
    fn writer_seals_and_resets_index() {
        let mut writer = BufferWriter::new(BufferKind::Fill);
        // Fill right up to the capacity limit.
        for _ in 0..MAX_VERTEX_COUNT {
            writer.emit(1, |index, buffer| {
                buffer.add_vertex(0.0);
                buffer.add_vertex(0.0);
                buffer.add_vertex(0.0);
                buffer.add_index(index as u16);
                index + 1
            });
        }

        assert_eq!(writer.index(), MAX_VERTEX_COUNT as u32);

        // The next vertex does not fit: the full buffer is sealed and the
        // local index starts over.
        writer.ensure_capacity(1, true);
        assert_eq!(writer.index(), 0);

        let array = writer.finish();
        assert_eq!(array.buffers().len(), 2);
        assert_eq!(array.buffers()[0].vertex_count(), MAX_VERTEX_COUNT);

        for buffer in array.buffers() {
            assert!(buffer.indices().iter().all(|&i| (i as usize) < MAX_VERTEX_COUNT));
        }
    }

    #[test]
    fn bind_is_idempotent() {
        use crate::render::tests::RecordingBackend;

        let mut backend = RecordingBackend::default();
        let mut buffer = GeometryBuffer::new(BufferKind::Line);
        buffer.add_vertex(1.0);

        buffer.bind(&mut backend).expect("upload failed");
        buffer.bind(&mut backend).expect("upload failed");
        assert_eq!(backend.uploads, 1);
        assert!(buffer.is_bound());
    }
}
