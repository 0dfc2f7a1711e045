//! Tensor intrinsics (§3): a hardware compute primitive described by a
//! pair of single-block `PrimFunc`s. Callers hand a `TensorIntrinsic`
//! value directly to `tensorize` rather than looking one up by name
//! against a global registry — SPEC_FULL §1 keeps that registry out of
//! scope.

use crate::ir::PrimFunc;

/// `desc` describes the abstract computation to match against; `impl_`
/// is the concrete implementation spliced in on a successful match.
/// Each is expected to describe exactly one top-level block.
#[derive(Clone, Debug)]
pub struct TensorIntrinsic {
    pub desc: PrimFunc,
    pub impl_: PrimFunc,
}

impl TensorIntrinsic {
    pub fn new(desc: PrimFunc, impl_: PrimFunc) -> TensorIntrinsic {
        TensorIntrinsic { desc, impl_ }
    }
}
