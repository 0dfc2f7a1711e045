//! The two "external collaborator" boundaries named throughout SPEC_FULL
//! §4 (`Analyzer`, `IterMapSolver`) plus the region-relaxation primitives
//! (`eval_set`/`union_regions`) that sit directly on top of them.

pub mod itermap;
pub mod region;
pub mod simplify;

pub use itermap::{IterMapSolver, IterMark, IterSplitExpr, IterSumExpr, LinearIterMapSolver};
pub use region::{eval_set, union_regions, IntervalSet};
pub use simplify::Analyzer;
