//! Inner block-realize and reduction-init subtree generation
//! (SPEC_FULL §4.5).

use crate::analysis::simplify::Analyzer;
use crate::ir::substitute::substitute_stmt;
use crate::ir::{Block, BlockRealize, Expr, ForKind, IterType, IterVar, Stmt};
use std::collections::HashMap;
use std::rc::Rc;

/// Clones `substituted_block` (the block after §4.4's substitution has
/// already been applied to its body/init/reads/writes), re-points its
/// `iter_vars` at the inner iter vars, clears `init` (the outer block
/// carries it instead, see `generate_outer_init`), and — when the outer
/// block will carry a reduction — prepends the block's writes to its
/// reads so the inner realize reads-before-writes its own accumulator.
pub fn generate_inner(
    substituted_block: &Block,
    inner_iter_vars: Vec<IterVar>,
    inner_bindings: Vec<Expr>,
    inner_predicate: Expr,
    has_outer_reduction: bool,
) -> BlockRealize {
    let mut reads = substituted_block.reads.clone();
    if has_outer_reduction {
        let mut prefixed = substituted_block.writes.clone();
        prefixed.extend(reads);
        reads = prefixed;
    }

    let inner_block = Block {
        iter_vars: inner_iter_vars,
        reads,
        writes: substituted_block.writes.clone(),
        name_hint: substituted_block.name_hint.clone(),
        body: substituted_block.body.clone(),
        init: None,
        alloc_buffers: substituted_block.alloc_buffers.clone(),
        match_buffers: substituted_block.match_buffers.clone(),
        annotations: substituted_block.annotations.clone(),
    };

    BlockRealize::new(inner_bindings, inner_predicate, inner_block)
}

/// Builds the outer block's reduction-init subtree: a realization of the
/// (already-substituted) init body over only the DataPar inner iter vars
/// it actually references, wrapped in fresh loop nests over those same
/// iters.
pub fn generate_outer_init(
    substituted_init: &Stmt,
    inner_iter_vars: &[IterVar],
    write_region: &[crate::ir::BufferRegion],
    name_hint: &str,
    analyzer: &Analyzer,
) -> Stmt {
    let mut referenced = Vec::new();
    substituted_init.free_vars(&mut referenced);

    let used_data_par: Vec<&IterVar> = inner_iter_vars
        .iter()
        .filter(|iv| iv.iter_type == IterType::DataPar && referenced.iter().any(|v| v == &iv.var))
        .collect();

    let mut rename: HashMap<u64, Expr> = HashMap::new();
    let mut fresh_vars = Vec::new();
    for iv in &used_data_par {
        let fresh = iv.var.with_suffix("_init");
        rename.insert(iv.var.id(), Expr::var(fresh.clone()));
        fresh_vars.push((fresh, iv.domain.clone()));
    }

    let (renamed_body, _) = substitute_stmt(substituted_init, &rename, analyzer);

    let init_iter_vars: Vec<IterVar> = fresh_vars
        .iter()
        .map(|(v, dom)| IterVar::new(dom.clone(), v.clone(), IterType::DataPar))
        .collect();
    let iter_values: Vec<Expr> = fresh_vars.iter().map(|(v, _)| Expr::var(v.clone())).collect();

    let init_block = Block {
        iter_vars: init_iter_vars,
        reads: Vec::new(),
        writes: write_region.to_vec(),
        name_hint: format!("{}_init", name_hint),
        body: Rc::new(renamed_body),
        init: None,
        alloc_buffers: Vec::new(),
        match_buffers: Vec::new(),
        annotations: Default::default(),
    };
    let realize = BlockRealize::new(iter_values, Expr::const_true(), init_block);

    let loops: Vec<(crate::ir::Var, Expr, Expr, ForKind)> = fresh_vars
        .iter()
        .map(|(v, dom)| (v.clone(), dom.min.clone(), dom.extent.clone(), ForKind::Serial))
        .collect();
    Stmt::wrap_loops(&loops, Stmt::realize(realize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Buffer, BufferRegion, DataType, Range, Var};

    #[test]
    fn outer_init_wraps_only_referenced_data_par_iters() {
        let analyzer = Analyzer::new();
        let i_i = Var::new("i_i", DataType::I32);
        let k_i = Var::new("k_i", DataType::I32);
        let c = Buffer::new("C", vec![Expr::int(16), Expr::int(16)], DataType::I32);
        let init_body = Stmt::BufferStore {
            buffer: c.clone(),
            indices: vec![Expr::var(i_i.clone()), Expr::int(0)],
            value: Expr::int(0),
        };
        let inner_iter_vars = vec![
            IterVar::new(Range::from_extent(Expr::int(16)), i_i.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(16)), k_i.clone(), IterType::CommReduce),
        ];
        let stmt = generate_outer_init(
            &init_body,
            &inner_iter_vars,
            &[BufferRegion::full(c)],
            "C",
            &analyzer,
        );
        match stmt {
            Stmt::For { loop_var, body, .. } => {
                assert!(loop_var.name_hint.ends_with("_init"));
                match body.as_ref() {
                    Stmt::BlockRealizeStmt(br) => assert_eq!(br.iter_values.len(), 1),
                    other => panic!("expected a single realize, got {:?}", other),
                }
            }
            other => panic!("expected a single wrapping loop, got {:?}", other),
        }
    }
}
