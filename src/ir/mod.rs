//! The IR data model: a tree of statement nodes and pure expression nodes,
//! represented as tagged-variant enums and shared via `Rc`.
//!
//! This is a close cousin of the block/loop IR used by tensor-program
//! schedulers (TVM's TIR is the canonical example): `Var`s carry identity
//! independent of their name, `Block`s classify their iterators as
//! data-parallel or reduction, and a `BlockRealize` instantiates a `Block`
//! with concrete iterator bindings and a predicate.

mod block;
mod buffer;
mod display;
mod expr;
mod iter_var;
mod module;
mod stmt;
pub mod substitute;
pub mod visit;

pub use block::{Block, BlockRealize, MatchBufferRegion};
pub use buffer::{Buffer, BufferRegion};
pub use expr::{CmpOp, DataType, Expr, Var};
pub use iter_var::{IterType, IterVar, Range};
pub use module::{IrModule, PrimFunc};
pub use stmt::{AnnotationValue, Annotations, ForKind, Stmt};

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Allocates a fresh, globally unique variable id. Variable identity is
/// this id, never the name hint carried alongside it for diagnostics.
pub(crate) fn fresh_var_id() -> u64 {
    NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn fresh_buffer_id() -> u64 {
    NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)
}
