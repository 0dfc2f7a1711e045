//! The two user-facing schedule primitives (SPEC_FULL §4): Blockize
//! (§4.3-4.7) and Tensorize (§4.8), plus their shared collaborators —
//! the binding deriver (§4.4) and the inner/init generators (§4.5).

pub mod binding;
pub mod blockize;
pub mod generator;
pub mod tensorize;

pub use blockize::{blockize, blockize_group};
pub use tensorize::tensorize;
