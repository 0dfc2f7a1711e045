//! Subspace division (§4.3) and both forms of Blockize (§4.6 single-loop,
//! §4.7 group).

use crate::analysis::itermap::{IterMapSolver, IterMark, LinearIterMapSolver};
use crate::analysis::region::{domain_map, eval_set, union_regions};
use crate::analysis::simplify::Analyzer;
use crate::error::ScheduleError;
use crate::ir::substitute::{substitute_block_realize, substitute_expr, substitute_stmt};
use crate::ir::{Block, BlockRealize, Expr, ForKind, IterType, IterVar, Range, Stmt, Var};
use crate::primitives::binding::derive_bindings;
use crate::primitives::generator::{generate_inner, generate_outer_init};
use crate::schedule::sref::{block_identity, StmtSRef};
use crate::schedule::ScheduleState;
use crate::trace;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Division {
    pub parts: Vec<(IterMark, IterMark)>,
    pub outer_predicate: Expr,
    pub inner_predicate: Expr,
}

/// Finds the unique `BlockRealize` reached by walking straight down
/// through nested `For` loops from `start` (§4.6 Step A): fails (returns
/// `None`) if the chain branches into a multi-statement `SeqStmt` or an
/// `IfThenElse` before reaching a block.
fn find_unique_inner_realize(start: &Stmt) -> Option<&Rc<BlockRealize>> {
    let mut cur = start;
    loop {
        match cur {
            Stmt::For { body, .. } => cur = body,
            _ => return cur.as_single_block_realize(),
        }
    }
}

/// Collects the chain of `For` loops walked through by
/// `find_unique_inner_realize`, outermost (closest to `start`) first.
fn collect_inner_loops(start: &Stmt) -> Vec<(Var, Expr, Expr, ForKind)> {
    let mut out = Vec::new();
    let mut cur = start;
    while let Stmt::For { loop_var, min, extent, kind, body, .. } = cur {
        out.push((loop_var.clone(), min.clone(), extent.clone(), *kind));
        cur = body;
    }
    out
}

fn loop_extent(body: &Stmt, var_id: u64) -> Option<i64> {
    match body {
        Stmt::For { loop_var, extent, body: inner, .. } => {
            if loop_var.id() == var_id {
                extent.as_int_const()
            } else {
                loop_extent(inner, var_id)
            }
        }
        Stmt::SeqStmt(stmts) => stmts.iter().find_map(|s| loop_extent(s, var_id)),
        Stmt::IfThenElse { then_case, else_case, .. } => loop_extent(then_case, var_id)
            .or_else(|| else_case.as_ref().and_then(|e| loop_extent(e, var_id))),
        Stmt::BlockRealizeStmt(br) => loop_extent(&br.block.body, var_id),
        Stmt::BufferStore { .. } | Stmt::Evaluate(_) => None,
    }
}

/// §4.3 Step C: accepted only when the predicate is literally `1`/`true`
/// and every binding uses exclusively outer vars, exclusively inner vars,
/// or no loop var at all. A binding touching both sides fails the whole
/// divider.
fn trivial_fallback(
    bindings: &[Expr],
    predicate: &Expr,
    outer_extents: &HashMap<u64, i64>,
    inner_extents: &HashMap<u64, i64>,
) -> Option<Vec<(IterMark, IterMark)>> {
    if !predicate.is_const_true() {
        return None;
    }
    let mut out = Vec::with_capacity(bindings.len());
    for b in bindings {
        let mut free = Vec::new();
        b.free_vars(&mut free);
        let uses_outer = free.iter().any(|v| outer_extents.contains_key(&v.id()));
        let uses_inner = free.iter().any(|v| inner_extents.contains_key(&v.id()));
        let part = match (uses_outer, uses_inner) {
            (true, true) => return None,
            (true, false) => {
                let extent = match free.len() {
                    1 => outer_extents[&free[0].id()],
                    _ => return None,
                };
                (IterMark::new(b.clone(), extent), IterMark::unit(Expr::int(0)))
            }
            (false, true) => {
                let extent = match free.len() {
                    1 => inner_extents[&free[0].id()],
                    _ => return None,
                };
                (IterMark::unit(Expr::int(0)), IterMark::new(b.clone(), extent))
            }
            (false, false) => (IterMark::unit(b.clone()), IterMark::unit(Expr::int(0))),
        };
        out.push(part);
    }
    Some(out)
}

/// §4.3: divides the binding expressions of `realize` into an
/// outer/inner factorization relative to the loops at and below
/// `inner_loops` vs. those above.
fn divide_subspace(
    realize: &BlockRealize,
    inner_loops: &[(Var, Expr, Expr, ForKind)],
    outer_loop_extents: &HashMap<u64, i64>,
    solver: &dyn IterMapSolver,
    preserve_unit_iters: bool,
) -> Option<Division> {
    let inner_extents: HashMap<u64, i64> = inner_loops
        .iter()
        .filter_map(|(v, _, extent, _)| extent.as_int_const().map(|e| (v.id(), e)))
        .collect();
    if inner_extents.len() != inner_loops.len() {
        // A non-constant loop extent is outside both collaborators' reach.
        return None;
    }

    if let Some((parts, (outer_pred, inner_pred))) = solver.solve_surjective(
        &realize.iter_values,
        &realize.predicate,
        outer_loop_extents,
        &inner_extents,
        preserve_unit_iters,
    ) {
        return Some(Division {
            parts,
            outer_predicate: outer_pred,
            inner_predicate: inner_pred,
        });
    }

    let parts = trivial_fallback(&realize.iter_values, &realize.predicate, outer_loop_extents, &inner_extents)?;
    Some(Division {
        parts,
        outer_predicate: Expr::const_true(),
        inner_predicate: Expr::const_true(),
    })
}

/// §4.6: blockize the single-loop form. `loop_sref` demarcates the
/// inner/outer partition (inclusive of itself, per the default of §4.3
/// Step A).
#[tracing::instrument(skip(state))]
pub fn blockize(
    state: &mut ScheduleState,
    loop_sref: StmtSRef,
    preserve_unit_iters: bool,
) -> Result<StmtSRef, ScheduleError> {
    let solver = LinearIterMapSolver;
    let solver: &dyn IterMapSolver = &solver;
    if state.is_block_sref(loop_sref) {
        return Err(ScheduleError::ContractViolation(
            "blockize expects a loop sref, not a block sref".into(),
        ));
    }
    let loop_var_id = match &state.tree_node_loop_var_id(loop_sref) {
        Some(id) => *id,
        None => {
            return Err(ScheduleError::ContractViolation(
                "blockize target sref does not address a loop".into(),
            ))
        }
    };

    let loop_name = state.name_hint(loop_sref).to_string();
    let func_body = state.module.funcs[&state.func_name].body.clone();
    let loop_stmt = find_loop_stmt(&func_body, loop_var_id)
        .expect("sref-addressed loop var must exist in the current function body");

    // Step A.
    let realize = find_unique_inner_realize(&loop_stmt)
        .expect("blockize target loop must have a unique inner BlockRealize");
    let inner_loops = collect_inner_loops(&loop_stmt);

    let outer_extents: HashMap<u64, i64> = state
        .ancestor_loops(loop_sref)
        .into_iter()
        .filter(|&s| s != loop_sref)
        .filter_map(|s| {
            state
                .tree_node_loop_var_id(s)
                .and_then(|id| loop_extent(&func_body, id).map(|e| (id, e)))
        })
        .collect();

    // Step B.
    let division = divide_subspace(realize, &inner_loops, &outer_extents, solver, preserve_unit_iters)
        .ok_or_else(|| ScheduleError::SubspaceNotDivisible {
            module: state.module.clone(),
            loop_name: inner_loops.first().map(|(v, ..)| v.name_hint.clone()).unwrap_or_default(),
            block_name: realize.block.name_hint.clone(),
        })?;

    // Step D.
    let binding = derive_bindings(&realize.block.iter_vars, &division.parts, preserve_unit_iters, None);
    let analyzer = Analyzer::new();
    let (substituted_realize, mut reuse_map) = substitute_block_realize(realize, &binding.subst, &analyzer);
    reuse_map.push((realize.block.clone(), substituted_realize.block.clone()));

    // Step E.
    let has_outer_reduction = substituted_realize.block.init.is_some()
        && binding.outer_iter_vars.iter().any(|iv| iv.iter_type == IterType::CommReduce);
    let inner_realize = generate_inner(
        &substituted_realize.block,
        binding.inner_iter_vars.clone(),
        binding.inner_bindings,
        division.inner_predicate,
        has_outer_reduction,
    );
    reuse_map.push((substituted_realize.block.clone(), inner_realize.block.clone()));

    // Step F.
    let inner_domain: HashMap<u64, Range> = domain_map(
        &binding
            .inner_iter_vars
            .iter()
            .map(|iv| (iv.var.clone(), iv.domain.clone()))
            .collect::<Vec<_>>(),
    );
    let outer_reads = eval_set(&substituted_realize.block.reads, &inner_domain, &analyzer);
    let outer_writes = eval_set(&substituted_realize.block.writes, &inner_domain, &analyzer);

    let init = if let Some(init) = &substituted_realize.block.init {
        Some(generate_outer_init(
            init,
            &binding.inner_iter_vars,
            &outer_writes,
            &substituted_realize.block.name_hint,
            &analyzer,
        ))
    } else {
        None
    };

    let outer_body = Stmt::wrap_loops(&collect_loop_tuples(&binding.inner_iter_vars), Stmt::realize(inner_realize));
    let outer_block = Block {
        iter_vars: binding.outer_iter_vars,
        reads: outer_reads,
        writes: outer_writes,
        name_hint: format!("{}_o", substituted_realize.block.name_hint),
        body: Rc::new(outer_body),
        init: init.map(Rc::new),
        alloc_buffers: Vec::new(),
        match_buffers: Vec::new(),
        annotations: Default::default(),
    };
    let outer_realize = BlockRealize::new(binding.outer_bindings, division.outer_predicate, outer_block);
    let outer_block_rc = outer_realize.block.clone();

    let new_loop_stmt = Stmt::realize(outer_realize);
    let new_body = replace_loop(&func_body, loop_var_id, &new_loop_stmt);
    state.replace(new_body, &reuse_map);

    let outer_sref = state
        .sref_of_block(&outer_block_rc)
        .expect("freshly installed outer block must be addressable");
    trace::record_blockize(vec![loop_name], preserve_unit_iters, outer_block_rc.name_hint.clone());
    Ok(outer_sref)
}

fn collect_loop_tuples(inner_iter_vars: &[IterVar]) -> Vec<(Var, Expr, Expr, ForKind)> {
    inner_iter_vars
        .iter()
        .map(|iv| (iv.var.clone(), iv.domain.min.clone(), iv.domain.extent.clone(), ForKind::Serial))
        .collect()
}

fn find_loop_stmt(body: &Stmt, var_id: u64) -> Option<Stmt> {
    match body {
        Stmt::For { loop_var, .. } if loop_var.id() == var_id => Some(body.clone()),
        Stmt::For { body: inner, .. } => find_loop_stmt(inner, var_id),
        Stmt::SeqStmt(stmts) => stmts.iter().find_map(|s| find_loop_stmt(s, var_id)),
        Stmt::IfThenElse { then_case, else_case, .. } => find_loop_stmt(then_case, var_id)
            .or_else(|| else_case.as_ref().and_then(|e| find_loop_stmt(e, var_id))),
        Stmt::BlockRealizeStmt(br) => find_loop_stmt(&br.block.body, var_id),
        Stmt::BufferStore { .. } | Stmt::Evaluate(_) => None,
    }
}

/// Replaces the `Stmt::For` node whose loop var matches `var_id` with
/// `replacement`, cloning only the spine from the root to that node.
fn replace_loop(s: &Stmt, var_id: u64, replacement: &Stmt) -> Stmt {
    match s {
        Stmt::For { loop_var, min, extent, kind, body, thread_binding, annotations } => {
            if loop_var.id() == var_id {
                replacement.clone()
            } else {
                Stmt::For {
                    loop_var: loop_var.clone(),
                    min: min.clone(),
                    extent: extent.clone(),
                    kind: *kind,
                    body: Rc::new(replace_loop(body, var_id, replacement)),
                    thread_binding: thread_binding.clone(),
                    annotations: annotations.clone(),
                }
            }
        }
        Stmt::SeqStmt(stmts) => {
            Stmt::SeqStmt(stmts.iter().map(|s| Rc::new(replace_loop(s, var_id, replacement))).collect())
        }
        Stmt::IfThenElse { condition, then_case, else_case } => Stmt::IfThenElse {
            condition: condition.clone(),
            then_case: Rc::new(replace_loop(then_case, var_id, replacement)),
            else_case: else_case.as_ref().map(|e| Rc::new(replace_loop(e, var_id, replacement))),
        },
        Stmt::BlockRealizeStmt(br) => Stmt::BlockRealizeStmt(Rc::new(BlockRealize::from_rc(
            br.iter_values.clone(),
            br.predicate.clone(),
            Rc::new(Block {
                body: Rc::new(replace_loop(&br.block.body, var_id, replacement)),
                ..(*br.block).clone()
            }),
        ))),
        Stmt::BufferStore { .. } | Stmt::Evaluate(_) => s.clone(),
    }
}

// ---------------------------------------------------------------------
// §4.7 Group-blockize
// ---------------------------------------------------------------------

/// Ordering resolved by Open Question 1 (§9): walking root→lca,
/// ancestor-first, and at each level a loop binding is pushed before an
/// intermediate block's iter-var bindings.
fn collect_outer_bindings(
    state: &ScheduleState,
    func_body: &Stmt,
    lca: StmtSRef,
) -> (Vec<IterVar>, Vec<Expr>, HashMap<u64, Expr>) {
    let mut chain = state.ancestors(lca);
    chain.reverse(); // root-first

    let mut outer_iter_vars = Vec::new();
    let mut outer_bindings = Vec::new();
    let mut subst = HashMap::new();

    for sref in chain {
        if sref == lca {
            continue;
        }
        if let Some(loop_var_id) = state.tree_node_loop_var_id(sref) {
            if let Some(extent) = loop_extent(func_body, loop_var_id) {
                let name = state.name_hint(sref).to_string();
                let fresh = Var::new(format!("{}_o", name), crate::ir::DataType::I32);
                outer_iter_vars.push(IterVar::new(Range::from_extent(Expr::int(extent)), fresh.clone(), IterType::DataPar));
                outer_bindings.push(Expr::int(0));
                subst.insert(loop_var_id, Expr::var(fresh));
            }
        } else if state.is_block_sref(sref) {
            let block = state.get_block_realize(sref).block.clone();
            for iv in &block.iter_vars {
                let fresh = iv.var.with_suffix("_o");
                outer_iter_vars.push(IterVar::new(iv.domain.clone(), fresh.clone(), iv.iter_type));
                outer_bindings.push(Expr::var(iv.var.clone()));
                subst.insert(iv.var.id(), Expr::var(fresh));
            }
        }
    }

    (outer_iter_vars, outer_bindings, subst)
}

#[tracing::instrument(skip(state))]
pub fn blockize_group(
    state: &mut ScheduleState,
    block_srefs: &[StmtSRef],
    preserve_unit_iters: bool,
) -> Result<StmtSRef, ScheduleError> {
    if block_srefs.is_empty() {
        return Err(ScheduleError::ContractViolation("blockize_group requires at least one block".into()));
    }
    let lca = state.get_sref_lowest_common_ancestor(block_srefs);
    let func_body = state.module.funcs[&state.func_name].body.clone();
    let analyzer = Analyzer::new();

    let (outer_iter_vars, outer_bindings, ancestor_subst) = collect_outer_bindings(state, &func_body, lca);

    let mut accumulated_reads = Vec::new();
    let mut accumulated_writes = Vec::new();
    let mut inner_realizes = Vec::new();
    let mut names = Vec::new();
    let mut reuse_map = Vec::new();
    let mut target_ptrs = Vec::new();

    for &sref in block_srefs {
        let realize = state.get_block_realize(sref);
        if realize.block.init.is_some() {
            return Err(ScheduleError::ContractViolation(
                "No reduction iter vars allowed for the outer loops when blockize multiple blocks".into(),
            ));
        }

        let mut own_subst: HashMap<u64, Expr> = HashMap::new();
        let mut inner_iter_vars = Vec::new();
        for iv in &realize.block.iter_vars {
            let fresh = iv.var.with_suffix("_i");
            own_subst.insert(iv.var.id(), Expr::var(fresh.clone()));
            inner_iter_vars.push(IterVar::new(iv.domain.clone(), fresh, iv.iter_type));
        }
        let (substituted_block, mut block_reuse) = substitute_stmt(
            &Stmt::realize(BlockRealize::from_rc(realize.iter_values.clone(), realize.predicate.clone(), realize.block.clone())),
            &own_subst,
            &analyzer,
        );
        let substituted_block_rc = match &substituted_block {
            Stmt::BlockRealizeStmt(br) => br.block.clone(),
            _ => unreachable!("substituting a BlockRealizeStmt always yields one"),
        };
        reuse_map.append(&mut block_reuse);
        reuse_map.push((realize.block.clone(), substituted_block_rc.clone()));

        let inner_block = Block {
            iter_vars: inner_iter_vars,
            ..(*substituted_block_rc).clone()
        };

        let renamed_values: Vec<Expr> = realize
            .iter_values
            .iter()
            .map(|v| substitute_expr(v, &ancestor_subst, &analyzer))
            .collect();
        let renamed_predicate = substitute_expr(&realize.predicate, &ancestor_subst, &analyzer);
        let inner_block_rc = Rc::new(inner_block);
        reuse_map.push((substituted_block_rc, inner_block_rc.clone()));
        let inner_realize = BlockRealize::from_rc(renamed_values, renamed_predicate, inner_block_rc);

        accumulated_reads.extend(inner_realize.block.reads.clone());
        accumulated_writes.extend(inner_realize.block.writes.clone());
        names.push(inner_realize.block.name_hint.clone());
        target_ptrs.push(block_identity(&realize.block));
        inner_realizes.push(inner_realize);
    }

    let (outer_iter_vars, outer_bindings) = if outer_iter_vars.is_empty() {
        let dummy = Var::new("init_o", crate::ir::DataType::I32);
        (
            vec![IterVar::new(Range::from_extent(Expr::int(1)), dummy, IterType::DataPar)],
            vec![Expr::int(0)],
        )
    } else {
        (outer_iter_vars, outer_bindings)
    };

    let outer_block = Block {
        iter_vars: outer_iter_vars,
        reads: union_regions(&accumulated_reads, &analyzer),
        writes: union_regions(&accumulated_writes, &analyzer),
        name_hint: format!("outer_{}_", names.join("_")),
        body: Rc::new(Stmt::SeqStmt(inner_realizes.into_iter().map(|r| Rc::new(Stmt::realize(r))).collect())),
        init: None,
        alloc_buffers: Vec::new(),
        match_buffers: Vec::new(),
        annotations: Default::default(),
    };
    let outer_realize = BlockRealize::new(outer_bindings, Expr::const_true(), outer_block);
    let outer_block_rc = outer_realize.block.clone();

    let spliced = splice_consecutive_run(&func_body, &target_ptrs, Stmt::realize(outer_realize))
        .map_err(ScheduleError::ContractViolation)?;
    let new_body = if ancestor_subst.is_empty() {
        spliced
    } else {
        substitute_stmt(&spliced, &ancestor_subst, &analyzer).0
    };

    state.replace(new_body, &reuse_map);
    let outer_sref = state
        .sref_of_block(&outer_block_rc)
        .expect("freshly installed outer block must be addressable");
    trace::record_blockize(names, preserve_unit_iters, outer_block_rc.name_hint.clone());
    Ok(outer_sref)
}

/// Finds the maximal consecutive run of `target_ptrs` within a `SeqStmt`
/// body and replaces it with `replacement`, erroring if the targets are
/// siblings but not contiguous (§4.7).
fn splice_consecutive_run(s: &Stmt, target_ptrs: &[usize], replacement: Stmt) -> Result<Stmt, String> {
    match s {
        Stmt::SeqStmt(stmts) => {
            let flags: Vec<bool> = stmts
                .iter()
                .map(|s| match s.as_ref() {
                    Stmt::BlockRealizeStmt(br) => target_ptrs.contains(&block_identity(&br.block)),
                    _ => false,
                })
                .collect();
            if flags.iter().any(|&f| f) {
                let first = flags.iter().position(|&f| f).unwrap();
                let last = flags.iter().rposition(|&f| f).unwrap();
                let run_count = flags[first..=last].iter().filter(|&&f| f).count();
                if run_count != target_ptrs.len() || flags[first..=last].iter().any(|&f| !f) {
                    return Err("Target blocks must be consecutive!".to_string());
                }
                let mut new_stmts: Vec<Rc<Stmt>> = stmts[..first].to_vec();
                new_stmts.push(Rc::new(replacement));
                new_stmts.extend(stmts[last + 1..].to_vec());
                return Ok(Stmt::SeqStmt(new_stmts));
            }
            let rewritten: Vec<Rc<Stmt>> = stmts
                .iter()
                .map(|s| splice_consecutive_run(s, target_ptrs, replacement.clone()).map(Rc::new))
                .collect::<Result<_, _>>()?;
            Ok(Stmt::SeqStmt(rewritten))
        }
        Stmt::For { loop_var, min, extent, kind, body, thread_binding, annotations } => Ok(Stmt::For {
            loop_var: loop_var.clone(),
            min: min.clone(),
            extent: extent.clone(),
            kind: *kind,
            body: Rc::new(splice_consecutive_run(body, target_ptrs, replacement)?),
            thread_binding: thread_binding.clone(),
            annotations: annotations.clone(),
        }),
        Stmt::BlockRealizeStmt(br) if target_ptrs.contains(&block_identity(&br.block)) && target_ptrs.len() == 1 => {
            Ok(replacement)
        }
        Stmt::BlockRealizeStmt(br) => Ok(Stmt::BlockRealizeStmt(Rc::new(BlockRealize::from_rc(
            br.iter_values.clone(),
            br.predicate.clone(),
            Rc::new(Block {
                body: Rc::new(splice_consecutive_run(&br.block.body, target_ptrs, replacement)?),
                ..(*br.block).clone()
            }),
        )))),
        Stmt::IfThenElse { .. } | Stmt::BufferStore { .. } | Stmt::Evaluate(_) => Ok(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, PrimFunc};

    #[test]
    fn blockize_single_loop_produces_outer_block() {
        let i = Var::new("i", DataType::I32);
        let block = Block::new(
            "C",
            vec![IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar)],
            Stmt::Evaluate(Expr::var(i.clone())),
        );
        let realize = BlockRealize::new(vec![Expr::var(i.clone())], Expr::const_true(), block);
        let body = Stmt::for_(i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial, Stmt::realize(realize));
        let module = crate::ir::IrModule::new("mod").with_func(PrimFunc::new("main", vec![], body));

        let mut state = ScheduleState::new(module, "main");
        let loop_sref = state.sref_of_loop(i.id()).unwrap();
        let outer_sref = blockize(&mut state, loop_sref, false).expect("divisible subspace");
        assert!(state.is_block_sref(outer_sref));
        assert_eq!(state.name_hint(outer_sref), "C_o");
        let realize = state.get_block_realize(outer_sref);
        assert_eq!(realize.block.iter_vars.len(), 1);
    }

    #[test]
    fn blockize_nontrivial_predicate_is_not_divisible() {
        let i = Var::new("i", DataType::I32);
        let block = Block::new(
            "C",
            vec![IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar)],
            Stmt::Evaluate(Expr::var(i.clone())),
        );
        let predicate = Expr::eq(Expr::floormod(Expr::var(i.clone()), Expr::int(3)), Expr::int(0));
        let realize = BlockRealize::new(vec![Expr::var(i.clone())], predicate, block);
        let body = Stmt::for_(i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial, Stmt::realize(realize));
        let module = crate::ir::IrModule::new("mod").with_func(PrimFunc::new("main", vec![], body));

        let mut state = ScheduleState::new(module, "main");
        let loop_sref = state.sref_of_loop(i.id()).unwrap();
        let err = blockize(&mut state, loop_sref, false).expect_err("non-trivial predicate must fail to divide");
        assert!(matches!(err, ScheduleError::SubspaceNotDivisible { .. }));
    }
}
