//! Binding deriver (SPEC_FULL §4.4): turns a per-iterator division into
//! fresh outer/inner iterator variables, their bindings, and the
//! substitution map used to rewrite the original block.

use crate::analysis::itermap::IterMark;
use crate::ir::{Expr, IterType, IterVar, Range, Var};
use std::collections::HashMap;

pub struct BindingResult {
    pub outer_iter_vars: Vec<IterVar>,
    pub outer_bindings: Vec<Expr>,
    pub inner_iter_vars: Vec<IterVar>,
    pub inner_bindings: Vec<Expr>,
    /// `original iter var id -> substitution expression`.
    pub subst: HashMap<u64, Expr>,
}

/// `division[i] = (outer_mark, inner_mark)` for the `i`-th original iter
/// var; `reuse_outer`, when given, supplies already-allocated outer iter
/// vars to reuse positionally (the group-blockize path, where several
/// target blocks share the same set of outer loops).
pub fn derive_bindings(
    iter_vars: &[IterVar],
    division: &[(IterMark, IterMark)],
    preserve_unit_iters: bool,
    reuse_outer: Option<&[IterVar]>,
) -> BindingResult {
    assert_eq!(iter_vars.len(), division.len());

    let mut outer_iter_vars = Vec::new();
    let mut outer_bindings = Vec::new();
    let mut inner_iter_vars = Vec::new();
    let mut inner_bindings = Vec::new();
    let mut subst = HashMap::new();

    for (i, original) in iter_vars.iter().enumerate() {
        let (outer_mark, inner_mark) = &division[i];

        let outer_iter = match reuse_outer.and_then(|r| r.get(i)) {
            Some(existing) => {
                assert_eq!(
                    existing.domain.extent.as_int_const(),
                    Some(outer_mark.extent()),
                    "reused outer iter var's extent must match this block's division"
                );
                existing.clone()
            }
            None => IterVar::new(
                Range::from_extent(Expr::int(outer_mark.extent())),
                original.var.with_suffix("_o"),
                original.iter_type,
            ),
        };
        outer_bindings.push(outer_mark.to_expr());

        let substitution = if inner_mark.extent() == 1 {
            if outer_mark.extent() == 1 && !preserve_unit_iters {
                Expr::int(0)
            } else {
                Expr::var(outer_iter.var.clone())
            }
        } else {
            let inner_iter = IterVar::new(
                Range::from_extent(Expr::int(inner_mark.extent())),
                original.var.with_suffix("_i"),
                original.iter_type,
            );
            // The inner loop nest generator (§4.5) always wraps the new
            // inner realize in a fresh `for <inner_iter.var>` loop, so the
            // realize's own binding for it is simply itself — `inner_mark`
            // is expressed over the pre-blockize loop vars, which this
            // primitive is about to discard (see DESIGN.md).
            inner_bindings.push(Expr::var(inner_iter.var.clone()));
            let sub = if outer_mark.extent() == 1 {
                Expr::var(inner_iter.var.clone())
            } else {
                Expr::add(
                    Expr::mul(Expr::var(outer_iter.var.clone()), Expr::int(inner_mark.extent())),
                    Expr::var(inner_iter.var.clone()),
                )
            };
            inner_iter_vars.push(inner_iter);
            sub
        };

        subst.insert(original.var.id(), substitution);
        if reuse_outer.and_then(|r| r.get(i)).is_none() {
            outer_iter_vars.push(outer_iter);
        }
    }

    BindingResult {
        outer_iter_vars,
        outer_bindings,
        inner_iter_vars,
        inner_bindings,
        subst,
    }
}
