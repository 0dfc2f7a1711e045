use crate::ir::{Annotations, Buffer, BufferRegion, Expr, IterVar, Stmt};
use std::rc::Rc;

/// Declares that `source` (a buffer local to an intrinsic implementation
/// or an inner block) aliases the sub-region of `target.buffer` described
/// by `target.region`.
#[derive(Clone, Debug)]
pub struct MatchBufferRegion {
    pub source: Buffer,
    pub target: BufferRegion,
}

impl MatchBufferRegion {
    pub fn new(source: Buffer, target: BufferRegion) -> MatchBufferRegion {
        MatchBufferRegion { source, target }
    }
}

/// A block: the unit of compute scope in this IR. `iter_vars` classifies
/// each block iterator as data-parallel or reduction; `reads`/`writes`
/// declare the buffer regions the block touches (used for dependence
/// analysis and, here, for region relaxation); `init` holds the
/// reduction-init subtree when present.
#[derive(Clone, Debug)]
pub struct Block {
    pub iter_vars: Vec<IterVar>,
    pub reads: Vec<BufferRegion>,
    pub writes: Vec<BufferRegion>,
    pub name_hint: String,
    pub body: Rc<Stmt>,
    pub init: Option<Rc<Stmt>>,
    pub alloc_buffers: Vec<Buffer>,
    pub match_buffers: Vec<MatchBufferRegion>,
    pub annotations: Annotations,
}

impl Block {
    pub fn new(name_hint: impl Into<String>, iter_vars: Vec<IterVar>, body: Stmt) -> Block {
        Block {
            iter_vars,
            reads: Vec::new(),
            writes: Vec::new(),
            name_hint: name_hint.into(),
            body: Rc::new(body),
            init: None,
            alloc_buffers: Vec::new(),
            match_buffers: Vec::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn with_reads(mut self, reads: Vec<BufferRegion>) -> Block {
        self.reads = reads;
        self
    }

    pub fn with_writes(mut self, writes: Vec<BufferRegion>) -> Block {
        self.writes = writes;
        self
    }

    pub fn with_init(mut self, init: Stmt) -> Block {
        self.init = Some(Rc::new(init));
        self
    }
}

/// The instantiation of a `Block` with concrete iterator bindings and a
/// predicate. Invariant: `iter_values.len() == block.iter_vars.len()`.
#[derive(Clone, Debug)]
pub struct BlockRealize {
    pub iter_values: Vec<Expr>,
    pub predicate: Expr,
    pub block: Rc<Block>,
}

impl BlockRealize {
    pub fn new(iter_values: Vec<Expr>, predicate: Expr, block: Block) -> BlockRealize {
        assert_eq!(
            iter_values.len(),
            block.iter_vars.len(),
            "BlockRealize invariant: |iter_values| must equal |block.iter_vars|"
        );
        BlockRealize {
            iter_values,
            predicate,
            block: Rc::new(block),
        }
    }

    pub fn from_rc(iter_values: Vec<Expr>, predicate: Expr, block: Rc<Block>) -> BlockRealize {
        assert_eq!(iter_values.len(), block.iter_vars.len());
        BlockRealize {
            iter_values,
            predicate,
            block,
        }
    }
}
