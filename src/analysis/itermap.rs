//! The affine iter-map solver boundary (SPEC_FULL §3, §4.3 Step B): the
//! real TIR iter-map solver is Presburger-style and explicitly out of
//! scope. `LinearIterMapSolver` is the "concrete stand-in" the spec asks
//! for: it only handles bindings that are integer-linear combinations of
//! distinct loop vars (which is exactly what every S1-S6 scenario needs),
//! and fails closed — returning `None` — on anything else, handing off to
//! the trivial fallback of §4.3 Step C.

use crate::ir::{Expr, Var};
use std::collections::HashMap;
use std::rc::Rc;

/// One scaled atomic term of a flattened binding: `scale * source`, where
/// `source` ranges over `[0, extent)`.
#[derive(Clone, Debug)]
pub struct IterSplitExpr {
    pub source: Var,
    pub extent: i64,
    pub scale: i64,
}

/// A flattened binding expression: `base + Σ term.scale * term.source`.
#[derive(Clone, Debug, Default)]
pub struct IterSumExpr {
    pub terms: Vec<IterSplitExpr>,
    pub base: i64,
}

/// An algebraic certificate for one side (outer or inner) of a division:
/// an opaque `(source, extent)` pair, normalizable back to a plain `Expr`.
#[derive(Clone, Debug)]
pub struct IterMark {
    source: Expr,
    extent: i64,
}

impl IterMark {
    pub fn unit(value: Expr) -> IterMark {
        IterMark {
            source: value,
            extent: 1,
        }
    }

    pub fn new(source: Expr, extent: i64) -> IterMark {
        IterMark { source, extent }
    }

    pub fn extent(&self) -> i64 {
        self.extent
    }

    /// Normalizes this mark back into a plain expression (the "source"
    /// term of the division).
    pub fn to_expr(&self) -> Expr {
        self.source.clone()
    }
}

/// The external surjective-mode iter-map collaborator named by §4.3 Step
/// B. `outer_vars`/`inner_vars` carry each candidate var's declared loop
/// extent (used to size the resulting marks).
pub trait IterMapSolver {
    #[allow(clippy::too_many_arguments)]
    fn solve_surjective(
        &self,
        bindings: &[Expr],
        predicate: &Expr,
        outer_vars: &HashMap<u64, i64>,
        inner_vars: &HashMap<u64, i64>,
        preserve_unit_iters: bool,
    ) -> Option<(Vec<(IterMark, IterMark)>, (Expr, Expr))>;
}

/// Flattens `e` into `base + Σ scale·var`, failing on anything that isn't
/// a sum of (optionally scaled) distinct vars — multiplication of two
/// vars, division, comparisons, etc. all fall outside this solver's
/// linear fragment.
fn flatten(e: &Expr) -> Option<IterSumExpr> {
    match e {
        Expr::IntImm(v, _) => Some(IterSumExpr {
            terms: Vec::new(),
            base: *v,
        }),
        Expr::Var(v) => Some(IterSumExpr {
            terms: vec![IterSplitExpr {
                source: v.clone(),
                extent: i64::MAX,
                scale: 1,
            }],
            base: 0,
        }),
        Expr::Add(a, b) => {
            let mut lhs = flatten(a)?;
            let rhs = flatten(b)?;
            lhs.base += rhs.base;
            lhs.terms.extend(rhs.terms);
            Some(lhs)
        }
        Expr::Sub(a, b) => {
            let mut lhs = flatten(a)?;
            let mut rhs = flatten(b)?;
            lhs.base -= rhs.base;
            for t in rhs.terms.iter_mut() {
                t.scale = -t.scale;
            }
            lhs.terms.extend(rhs.terms);
            Some(lhs)
        }
        Expr::Mul(a, b) => match (a.as_int_const(), flatten(b)) {
            (Some(c), Some(mut rhs)) => {
                rhs.base *= c;
                for t in rhs.terms.iter_mut() {
                    t.scale *= c;
                }
                Some(rhs)
            }
            _ => match (b.as_int_const(), flatten(a)) {
                (Some(c), Some(mut lhs)) => {
                    lhs.base *= c;
                    for t in lhs.terms.iter_mut() {
                        t.scale *= c;
                    }
                    Some(lhs)
                }
                _ => None,
            },
        },
        _ => None,
    }
}

/// Whether `e` lies in this solver's linear fragment (a sum of optionally
/// scaled distinct vars). Used by `ScheduleState::update_scope_block_info`
/// as a cheap proxy for "this block's binding is affine".
pub fn flatten_is_linear(e: &Expr) -> bool {
    flatten(e).is_some()
}

fn rebuild(sum: &IterSumExpr, dtype: crate::ir::DataType) -> Rc<Expr> {
    let mut acc: Option<Expr> = if sum.base != 0 {
        Some(Expr::IntImm(sum.base, dtype))
    } else {
        None
    };
    for t in &sum.terms {
        let term = if t.scale == 1 {
            Expr::var(t.source.clone())
        } else {
            Expr::mul(Expr::IntImm(t.scale, dtype), Expr::var(t.source.clone()))
        };
        acc = Some(match acc {
            Some(a) => Expr::add(a, term),
            None => term,
        });
    }
    Rc::new(acc.unwrap_or(Expr::IntImm(0, dtype)))
}

/// The concrete linear stand-in collaborator: §4.3 Step B's affine solver.
pub struct LinearIterMapSolver;

impl IterMapSolver for LinearIterMapSolver {
    fn solve_surjective(
        &self,
        bindings: &[Expr],
        predicate: &Expr,
        outer_vars: &HashMap<u64, i64>,
        inner_vars: &HashMap<u64, i64>,
        _preserve_unit_iters: bool,
    ) -> Option<(Vec<(IterMark, IterMark)>, (Expr, Expr))> {
        // This linear fragment can only certify surjectivity when the
        // predicate places no extra constraint on the bindings; anything
        // else is handed to the trivial fallback of §4.3 Step C, which
        // only ever accepts a literally-true predicate anyway.
        if !predicate.is_const_true() {
            return None;
        }

        let mut out = Vec::new();
        for b in bindings {
            let sum = flatten(b)?;
            let mut outer = IterSumExpr::default();
            let mut inner = IterSumExpr::default();
            outer.base = 0;
            inner.base = sum.base;
            let mut outer_extent: i64 = 1;
            let mut inner_extent: i64 = 1;

            for mut term in sum.terms {
                if let Some(extent) = outer_vars.get(&term.source.id()) {
                    term.extent = *extent;
                    outer_extent = outer_extent.saturating_mul(*extent);
                    outer.terms.push(term);
                } else if let Some(extent) = inner_vars.get(&term.source.id()) {
                    term.extent = *extent;
                    inner_extent = inner_extent.saturating_mul(*extent);
                    inner.terms.push(term);
                } else {
                    // A var from neither declared set: outside this
                    // collaborator's linear fragment.
                    return None;
                }
            }

            let dtype = b.dtype();
            let outer_mark = IterMark::new((*rebuild(&outer, dtype)).clone(), outer_extent);
            let inner_mark = IterMark::new((*rebuild(&inner, dtype)).clone(), inner_extent);
            out.push((outer_mark, inner_mark));
        }
        Some((out, (Expr::const_true(), Expr::const_true())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DataType;

    #[test]
    fn splits_single_inner_var_binding() {
        let solver = LinearIterMapSolver;
        let i = Var::new("i", DataType::I32);
        let mut inner_vars = HashMap::new();
        inner_vars.insert(i.id(), 128);
        let (result, _) = solver
            .solve_surjective(
                &[Expr::var(i.clone())],
                &Expr::const_true(),
                &HashMap::new(),
                &inner_vars,
                false,
            )
            .expect("linear solve should succeed");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.extent(), 1);
        assert_eq!(result[0].1.extent(), 128);
    }

    #[test]
    fn fails_on_nontrivial_predicate() {
        let solver = LinearIterMapSolver;
        let i = Var::new("i", DataType::I32);
        let pred = Expr::eq(Expr::floormod(Expr::var(i.clone()), Expr::int(3)), Expr::int(0));
        let mut inner_vars = HashMap::new();
        inner_vars.insert(i.id(), 128);
        assert!(solver
            .solve_surjective(&[Expr::var(i)], &pred, &HashMap::new(), &inner_vars, false)
            .is_none());
    }
}
