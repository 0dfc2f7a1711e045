//! Derived per-scope metadata (SPEC_FULL §3, §6): cached so
//! `is_affine_block_binding` doesn't re-walk the iter-value expressions on
//! every query.

use crate::schedule::sref::StmtSRef;

#[derive(Clone, Debug, Default)]
pub struct BlockScopeInfo {
    pub child_blocks: Vec<StmtSRef>,
    pub affine_binding: bool,
}
