use bytemuck::{Pod, Zeroable};

/// One debug-draw vertex, laid out exactly as the line pipeline's vertex
/// input expects it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugDrawVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

pub type DebugDrawIndex = u32;

const INITIAL_CAPACITY: usize = 1024;

/// CPU-side accumulated line geometry for one frame.
///
/// The world simulation appends during its tick; the debug pass uploads and
/// [`clear`](DebugDrawList::clear)s the list during the render step of the
/// same tick. Indices returned by [`push_vertex`](DebugDrawList::push_vertex)
/// are only valid until the next clear.
pub struct DebugDrawList {
    vertices: Vec<DebugDrawVertex>,
    indices: Vec<DebugDrawIndex>,
}

impl DebugDrawList {
    pub fn new() -> Self {
        Self {
            vertices: Vec::with_capacity(INITIAL_CAPACITY),
            indices: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Appends a vertex and returns its index in the current frame's list.
    pub fn push_vertex(&mut self, vertex: DebugDrawVertex) -> DebugDrawIndex {
        let index = self.vertices.len() as DebugDrawIndex;
        self.vertices.push(vertex);
        index
    }

    /// Appends one line segment between two previously pushed vertices.
    ///
    /// Both indices must come from [`push_vertex`](DebugDrawList::push_vertex)
    /// calls since the last clear.
    pub fn push_line(&mut self, vertex1: DebugDrawIndex, vertex2: DebugDrawIndex) {
        let count = self.vertices.len() as DebugDrawIndex;
        assert!(
            vertex1 < count && vertex2 < count,
            "line references vertex outside the current list ({vertex1}, {vertex2} >= {count})"
        );

        self.indices.push(vertex1);
        self.indices.push(vertex2);
    }

    /// Resets both lists without releasing their backing storage.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn vertices(&self) -> &[DebugDrawVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[DebugDrawIndex] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

impl Default for DebugDrawList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> DebugDrawVertex {
        DebugDrawVertex {
            position: [x, 0.0, 0.0],
            color: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn vertex_indices_are_sequential() {
        let mut list = DebugDrawList::new();
        assert_eq!(list.push_vertex(vertex(0.0)), 0);
        assert_eq!(list.push_vertex(vertex(1.0)), 1);
        assert_eq!(list.push_vertex(vertex(2.0)), 2);
        assert_eq!(list.vertex_count(), 3);
    }

    #[test]
    fn lines_append_index_pairs() {
        let mut list = DebugDrawList::new();
        let a = list.push_vertex(vertex(0.0));
        let b = list.push_vertex(vertex(1.0));
        let c = list.push_vertex(vertex(2.0));

        list.push_line(a, b);
        list.push_line(b, c);

        assert_eq!(list.index_count(), 4);
        assert_eq!(list.indices(), &[a, b, b, c]);
    }

    #[test]
    #[should_panic(expected = "line references vertex outside the current list")]
    fn out_of_range_line_index_is_rejected() {
        let mut list = DebugDrawList::new();
        let a = list.push_vertex(vertex(0.0));
        list.push_line(a, 7);
    }

    #[test]
    #[should_panic(expected = "line references vertex outside the current list")]
    fn indices_do_not_survive_a_clear() {
        let mut list = DebugDrawList::new();
        let a = list.push_vertex(vertex(0.0));
        let b = list.push_vertex(vertex(1.0));
        list.clear();
        list.push_line(a, b);
    }

    #[test]
    fn clear_resets_counts_and_index_allocation() {
        let mut list = DebugDrawList::new();
        let a = list.push_vertex(vertex(0.0));
        let b = list.push_vertex(vertex(1.0));
        list.push_line(a, b);

        list.clear();
        assert_eq!(list.vertex_count(), 0);
        assert_eq!(list.index_count(), 0);

        // The first vertex after a clear starts the numbering over.
        assert_eq!(list.push_vertex(vertex(3.0)), 0);
    }
}
