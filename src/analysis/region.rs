//! Region relaxation (SPEC_FULL §4.2): `eval_set` over-approximates buffer
//! regions under a domain map, `union_regions` merges same-buffer regions
//! accumulated across a group of blocks.

use crate::analysis::simplify::Analyzer;
use crate::ir::{Buffer, BufferRegion, Expr, Range, Var};
use std::collections::HashMap;

/// A per-dimension interval over-approximation: `[min, max]`, both
/// inclusive bounds as expressions (as opposed to `Range`'s half-open
/// `(min, extent)`, which is the form a `BufferRegion` is stored in).
#[derive(Clone, Debug)]
pub struct IntervalSet {
    pub min: Expr,
    pub max: Expr,
}

impl IntervalSet {
    pub fn new(min: Expr, max: Expr) -> IntervalSet {
        IntervalSet { min, max }
    }

    pub fn from_range(r: &Range, analyzer: &Analyzer) -> IntervalSet {
        let max = analyzer.simplify(&Expr::sub(
            Expr::add(r.min.clone(), r.extent.clone()),
            Expr::int(1),
        ));
        IntervalSet::new(r.min.clone(), max)
    }

    /// Evaluates this interval under `dom_map`, replacing every free var
    /// bound in the map with its full domain extent (the over-
    /// approximation step of `eval_set`).
    fn relax(&self, dom_map: &HashMap<u64, Range>, analyzer: &Analyzer) -> IntervalSet {
        let mut free = Vec::new();
        self.min.free_vars(&mut free);
        self.max.free_vars(&mut free);

        let mut min = self.min.clone();
        let mut max = self.max.clone();
        for v in &free {
            if let Some(dom) = dom_map.get(&v.id()) {
                let mut map_lo = HashMap::new();
                map_lo.insert(v.id(), dom.min.clone());
                let mut map_hi = HashMap::new();
                map_hi.insert(
                    v.id(),
                    Expr::sub(Expr::add(dom.min.clone(), dom.extent.clone()), Expr::int(1)),
                );
                min = analyzer.simplify(&crate::ir::substitute::substitute_expr(
                    &min, &map_lo, analyzer,
                ));
                max = analyzer.simplify(&crate::ir::substitute::substitute_expr(
                    &max, &map_hi, analyzer,
                ));
            }
        }
        IntervalSet::new(min, max)
    }

    fn union(&self, other: &IntervalSet, analyzer: &Analyzer) -> IntervalSet {
        IntervalSet::new(
            analyzer.simplify(&Expr::Min(self.min.clone().into(), other.min.clone().into())),
            analyzer.simplify(&Expr::Max(self.max.clone().into(), other.max.clone().into())),
        )
    }
}

/// Clamps a relaxed interval to `[0, shape - 1]`, per the "clamp to the
/// buffer's shape" clause of §4.2.
fn clamp_to_shape(iv: &IntervalSet, shape_dim: &Expr, analyzer: &Analyzer) -> IntervalSet {
    let min = analyzer.simplify(&Expr::Max(
        iv.min.clone().into(),
        Expr::int(0).into(),
    ));
    let max = analyzer.simplify(&Expr::Min(
        iv.max.clone().into(),
        Expr::sub(shape_dim.clone(), Expr::int(1)).into(),
    ));
    IntervalSet::new(min, max)
}

/// For each `BufferRegion`, compute per-dimension interval over-
/// approximations under `dom_map`, clamped to the buffer's declared shape.
pub fn eval_set(
    regions: &[BufferRegion],
    dom_map: &HashMap<u64, Range>,
    analyzer: &Analyzer,
) -> Vec<BufferRegion> {
    regions
        .iter()
        .map(|region| {
            let new_ranges = region
                .region
                .iter()
                .zip(region.buffer.shape.iter())
                .map(|(r, shape_dim)| {
                    let iv = IntervalSet::from_range(r, analyzer).relax(dom_map, analyzer);
                    let clamped = clamp_to_shape(&iv, shape_dim, analyzer);
                    Range::from_min_max(clamped.min, clamped.max)
                })
                .collect();
            BufferRegion::new(region.buffer.clone(), new_ranges)
        })
        .collect()
}

/// Groups `regions` by buffer identity (preserving first-seen order),
/// per-dimension unions the intervals, and materializes each dimension
/// back into a half-open `Range`.
pub fn union_regions(regions: &[BufferRegion], analyzer: &Analyzer) -> Vec<BufferRegion> {
    let mut order: Vec<Buffer> = Vec::new();
    let mut groups: HashMap<u64, Vec<Vec<IntervalSet>>> = HashMap::new();

    for region in regions {
        let id = region.buffer.id();
        if !groups.contains_key(&id) {
            order.push(region.buffer.clone());
        }
        let ivs: Vec<IntervalSet> = region
            .region
            .iter()
            .map(|r| IntervalSet::from_range(r, analyzer))
            .collect();
        groups.entry(id).or_default().push(ivs);
    }

    order
        .into_iter()
        .map(|buf| {
            let per_region = &groups[&buf.id()];
            let ndim = per_region[0].len();
            let unioned: Vec<Range> = (0..ndim)
                .map(|dim| {
                    let mut acc = per_region[0][dim].clone();
                    for ivs in &per_region[1..] {
                        acc = acc.union(&ivs[dim], analyzer);
                    }
                    Range::from_min_max(acc.min, acc.max)
                })
                .collect();
            BufferRegion::new(buf, unioned)
        })
        .collect()
}

/// Builds a domain map `Var -> Range` from a set of inner iter vars, the
/// form `eval_set` and `union_regions`' callers assemble before invoking
/// region relaxation on a substituted block's reads/writes.
pub fn domain_map(vars: &[(Var, Range)]) -> HashMap<u64, Range> {
    vars.iter().map(|(v, r)| (v.id(), r.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Buffer, DataType};

    #[test]
    fn eval_set_relaxes_point_index_to_loop_domain() {
        let analyzer = Analyzer::new();
        let buf = Buffer::new("A", vec![Expr::int(128)], DataType::I32);
        let i = Var::new("i", DataType::I32);
        // a point access A[i]: relax with i bound to a full [0, 128) domain.
        let mut dom = HashMap::new();
        dom.insert(i.id(), Range::from_extent(Expr::int(128)));
        let region = BufferRegion::new(buf, vec![Range::new(Expr::var(i), Expr::int(1))]);
        let out = eval_set(&[region], &dom, &analyzer);
        assert_eq!(out[0].region[0].min.as_int_const(), Some(0));
    }

    #[test]
    fn union_regions_groups_by_buffer_identity() {
        let analyzer = Analyzer::new();
        let buf = Buffer::new("C", vec![Expr::int(128), Expr::int(128)], DataType::I32);
        let r1 = BufferRegion::new(
            buf.clone(),
            vec![
                Range::new(Expr::int(0), Expr::int(16)),
                Range::new(Expr::int(0), Expr::int(16)),
            ],
        );
        let r2 = BufferRegion::new(
            buf.clone(),
            vec![
                Range::new(Expr::int(16), Expr::int(16)),
                Range::new(Expr::int(0), Expr::int(16)),
            ],
        );
        let out = union_regions(&[r1, r2], &analyzer);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].region[0].min.as_int_const(), Some(0));
        assert_eq!(out[0].region[0].extent.as_int_const(), Some(32));
    }
}
