use crate::ir::{Expr, Var};
use std::fmt;

/// A half-open range `[min, min + extent)`, both bounds expressions.
#[derive(Clone, Debug)]
pub struct Range {
    pub min: Expr,
    pub extent: Expr,
}

impl Range {
    pub fn new(min: Expr, extent: Expr) -> Range {
        Range { min, extent }
    }

    pub fn from_extent(extent: Expr) -> Range {
        Range {
            min: Expr::int(0),
            extent,
        }
    }

    /// `(min, max + 1)` as used by `union_regions` when materializing a
    /// unioned interval back into a `Range`.
    pub fn from_min_max(min: Expr, max: Expr) -> Range {
        Range {
            min: min.clone(),
            extent: Expr::add(Expr::sub(max, min), Expr::int(1)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterType {
    DataPar,
    CommReduce,
    Opaque,
}

impl fmt::Display for IterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IterType::DataPar => write!(f, "data_par"),
            IterType::CommReduce => write!(f, "reduce"),
            IterType::Opaque => write!(f, "opaque"),
        }
    }
}

/// A named iteration variable with a domain and a kind. Identity is the
/// `var`, not the domain or name — two `IterVar`s over the same domain
/// with the same name are still distinct unless they share a `var` id.
#[derive(Clone, Debug)]
pub struct IterVar {
    pub domain: Range,
    pub var: Var,
    pub iter_type: IterType,
}

impl IterVar {
    pub fn new(domain: Range, var: Var, iter_type: IterType) -> IterVar {
        IterVar {
            domain,
            var,
            iter_type,
        }
    }
}
