use crate::ir::{fresh_buffer_id, DataType, Expr, Range};
use std::rc::Rc;

/// A buffer: a data handle, an ordered shape of expressions, and an
/// element dtype. Identity is the buffer's id, not structural equality of
/// its fields — two buffers with the same shape and dtype are still
/// distinct unless they share an id, mirroring `Var`.
#[derive(Clone, Debug)]
pub struct Buffer {
    id: u64,
    pub name: String,
    pub shape: Vec<Rc<Expr>>,
    pub dtype: DataType,
}

impl Buffer {
    pub fn new(name: impl Into<String>, shape: Vec<Expr>, dtype: DataType) -> Buffer {
        Buffer {
            id: fresh_buffer_id(),
            name: name.into(),
            shape: shape.into_iter().map(Rc::new).collect(),
            dtype,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Buffer {}

impl std::hash::Hash for Buffer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A region of a buffer: one `Range` per dimension.
#[derive(Clone, Debug)]
pub struct BufferRegion {
    pub buffer: Buffer,
    pub region: Vec<Range>,
}

impl BufferRegion {
    pub fn new(buffer: Buffer, region: Vec<Range>) -> BufferRegion {
        BufferRegion { buffer, region }
    }

    /// A region covering the buffer's full shape (used when a buffer is
    /// referenced without explicit slicing).
    pub fn full(buffer: Buffer) -> BufferRegion {
        let region = buffer
            .shape
            .iter()
            .map(|e| Range::from_extent((**e).clone()))
            .collect();
        BufferRegion { buffer, region }
    }
}
