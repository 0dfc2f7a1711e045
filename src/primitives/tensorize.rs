//! Tensorize (SPEC_FULL §4.8): matches a blockized region against a
//! tensor-intrinsic descriptor and splices in its implementation.

use crate::error::ScheduleError;
use crate::intrinsic::TensorIntrinsic;
use crate::ir::{Block, BufferRegion, DataType, Expr, MatchBufferRegion, PrimFunc, Range, Stmt};
use crate::primitives::blockize::blockize;
use crate::schedule::sref::block_identity;
use crate::schedule::{ScheduleState, StmtSRef};
use crate::trace;
use std::collections::HashMap;
use std::rc::Rc;

/// Step C's collaborator: walks the descriptor body against the current
/// IR in lockstep, recording per-descriptor-buffer the current buffer it
/// aliases and the index expressions at its first access site.
#[derive(Default)]
struct MatchResult {
    buffer_map: HashMap<u64, crate::ir::Buffer>,
    base_indices: HashMap<u64, Vec<Expr>>,
}

impl MatchResult {
    fn record(&mut self, desc_buf: &crate::ir::Buffer, current_buf: &crate::ir::Buffer, indices: &[Rc<Expr>]) -> Result<(), ScheduleError> {
        match self.buffer_map.get(&desc_buf.id()) {
            Some(existing) if existing.id() != current_buf.id() => {
                return Err(ScheduleError::StructuralMatchFailure {
                    reason: format!("descriptor buffer {} matched two distinct current buffers", desc_buf.name),
                })
            }
            _ => {
                self.buffer_map.insert(desc_buf.id(), current_buf.clone());
                self.base_indices
                    .entry(desc_buf.id())
                    .or_insert_with(|| indices.iter().map(|i| (**i).clone()).collect());
            }
        }
        Ok(())
    }
}

fn stmt_match(desc: &Stmt, current: &Stmt, result: &mut MatchResult) -> Result<(), ScheduleError> {
    match (desc, current) {
        (Stmt::BlockRealizeStmt(d), Stmt::BlockRealizeStmt(c)) => stmt_match(&d.block.body, &c.block.body, result),
        (Stmt::SeqStmt(ds), Stmt::SeqStmt(cs)) if ds.len() == cs.len() => {
            for (d, c) in ds.iter().zip(cs.iter()) {
                stmt_match(d, c, result)?;
            }
            Ok(())
        }
        (Stmt::For { body: db, .. }, Stmt::For { body: cb, .. }) => stmt_match(db, cb, result),
        (
            Stmt::BufferStore { buffer: db, indices: di, value: dv },
            Stmt::BufferStore { buffer: cb, indices: ci, value: cv },
        ) => {
            if di.len() != ci.len() {
                return Err(ScheduleError::StructuralMatchFailure {
                    reason: "mismatched index arity on buffer store".into(),
                });
            }
            let di_rc: Vec<Rc<Expr>> = di.iter().cloned().map(Rc::new).collect();
            result.record(db, cb, &di_rc)?;
            expr_match(dv, cv, result)
        }
        (Stmt::Evaluate(d), Stmt::Evaluate(c)) => expr_match(d, c, result),
        (Stmt::IfThenElse { then_case: dt, .. }, Stmt::IfThenElse { then_case: ct, .. }) => stmt_match(dt, ct, result),
        // The current side may be a blockized tile: a reconstructed loop
        // nest wrapping an inner `BlockRealizeStmt`, while the descriptor
        // is the flat compute it wraps. Peel those wrappers on the
        // current side only, until both sides line up on the same shape.
        (_, Stmt::For { body: cb, .. }) => stmt_match(desc, cb, result),
        (_, Stmt::BlockRealizeStmt(c)) => stmt_match(desc, &c.block.body, result),
        _ => Err(ScheduleError::StructuralMatchFailure {
            reason: "statement shape did not match the intrinsic descriptor".into(),
        }),
    }
}

fn expr_match(desc: &Expr, current: &Expr, result: &mut MatchResult) -> Result<(), ScheduleError> {
    match (desc, current) {
        (Expr::BufferLoad(db, di), Expr::BufferLoad(cb, ci)) => {
            if di.len() != ci.len() {
                return Err(ScheduleError::StructuralMatchFailure {
                    reason: "mismatched index arity on buffer load".into(),
                });
            }
            result.record(db, cb, ci)
        }
        (Expr::Var(_), _) => Ok(()),
        (Expr::IntImm(dv, _), Expr::IntImm(cv, _)) if dv == cv => Ok(()),
        (Expr::Add(da, db_), Expr::Add(ca, cb_))
        | (Expr::Sub(da, db_), Expr::Sub(ca, cb_))
        | (Expr::Mul(da, db_), Expr::Mul(ca, cb_))
        | (Expr::FloorDiv(da, db_), Expr::FloorDiv(ca, cb_))
        | (Expr::FloorMod(da, db_), Expr::FloorMod(ca, cb_))
        | (Expr::Min(da, db_), Expr::Min(ca, cb_))
        | (Expr::Max(da, db_), Expr::Max(ca, cb_))
        | (Expr::And(da, db_), Expr::And(ca, cb_))
        | (Expr::Or(da, db_), Expr::Or(ca, cb_)) => {
            expr_match(da, ca, result)?;
            expr_match(db_, cb_, result)
        }
        (Expr::Cmp(dop, da, db_), Expr::Cmp(cop, ca, cb_)) if dop == cop => {
            expr_match(da, ca, result)?;
            expr_match(db_, cb_, result)
        }
        (Expr::Not(d), Expr::Not(c)) | (Expr::Cast(_, d), Expr::Cast(_, c)) => expr_match(d, c, result),
        (Expr::Select(dc, dt, de), Expr::Select(cc, ct, ce)) => {
            expr_match(dc, cc, result)?;
            expr_match(dt, ct, result)?;
            expr_match(de, ce, result)
        }
        _ => Err(ScheduleError::StructuralMatchFailure {
            reason: "expression shape did not match the intrinsic descriptor".into(),
        }),
    }
}

/// Widens every index expression occurring at a buffer access site to
/// `width` bits, wrapping narrower expressions in a `Cast` (§4.8 Step B).
fn widen_expr(e: &Expr, width: u8) -> Expr {
    let widen_index = |i: &Expr| -> Expr {
        let w = widen_expr(i, width);
        if w.dtype().is_int() && w.dtype().bits() != width {
            Expr::cast(w.dtype().with_bits(width), w)
        } else {
            w
        }
    };
    match e {
        Expr::BufferLoad(buf, indices) => {
            Expr::BufferLoad(buf.clone(), indices.iter().map(|i| Rc::new(widen_index(i))).collect())
        }
        Expr::Add(a, b) => Expr::add(widen_expr(a, width), widen_expr(b, width)),
        Expr::Sub(a, b) => Expr::sub(widen_expr(a, width), widen_expr(b, width)),
        Expr::Mul(a, b) => Expr::mul(widen_expr(a, width), widen_expr(b, width)),
        Expr::FloorDiv(a, b) => Expr::floordiv(widen_expr(a, width), widen_expr(b, width)),
        Expr::FloorMod(a, b) => Expr::floormod(widen_expr(a, width), widen_expr(b, width)),
        Expr::Min(a, b) => Expr::Min(Rc::new(widen_expr(a, width)), Rc::new(widen_expr(b, width))),
        Expr::Max(a, b) => Expr::Max(Rc::new(widen_expr(a, width)), Rc::new(widen_expr(b, width))),
        Expr::Cmp(op, a, b) => Expr::Cmp(*op, Rc::new(widen_expr(a, width)), Rc::new(widen_expr(b, width))),
        Expr::And(a, b) => Expr::And(Rc::new(widen_expr(a, width)), Rc::new(widen_expr(b, width))),
        Expr::Or(a, b) => Expr::Or(Rc::new(widen_expr(a, width)), Rc::new(widen_expr(b, width))),
        Expr::Not(a) => Expr::Not(Rc::new(widen_expr(a, width))),
        Expr::Select(c, t, f) => Expr::Select(
            Rc::new(widen_expr(c, width)),
            Rc::new(widen_expr(t, width)),
            Rc::new(widen_expr(f, width)),
        ),
        Expr::Cast(dt, a) => Expr::Cast(*dt, Rc::new(widen_expr(a, width))),
        Expr::IntImm(..) | Expr::FloatImm(..) | Expr::BoolImm(_) | Expr::Var(_) => e.clone(),
    }
}

fn widen_stmt(s: &Stmt, width: u8) -> Stmt {
    match s {
        Stmt::For { loop_var, min, extent, kind, body, thread_binding, annotations } => Stmt::For {
            loop_var: loop_var.clone(),
            min: min.clone(),
            extent: extent.clone(),
            kind: *kind,
            body: Rc::new(widen_stmt(body, width)),
            thread_binding: thread_binding.clone(),
            annotations: annotations.clone(),
        },
        Stmt::SeqStmt(stmts) => Stmt::SeqStmt(stmts.iter().map(|s| Rc::new(widen_stmt(s, width))).collect()),
        Stmt::IfThenElse { condition, then_case, else_case } => Stmt::IfThenElse {
            condition: widen_expr(condition, width),
            then_case: Rc::new(widen_stmt(then_case, width)),
            else_case: else_case.as_ref().map(|e| Rc::new(widen_stmt(e, width))),
        },
        Stmt::BlockRealizeStmt(br) => Stmt::BlockRealizeStmt(Rc::new(crate::ir::BlockRealize::from_rc(
            br.iter_values.clone(),
            br.predicate.clone(),
            Rc::new(Block { body: Rc::new(widen_stmt(&br.block.body, width)), ..(*br.block).clone() }),
        ))),
        Stmt::BufferStore { buffer, indices, value } => Stmt::BufferStore {
            buffer: buffer.clone(),
            indices: indices.iter().map(widen_expr_index(width)).collect(),
            value: widen_expr(value, width),
        },
        Stmt::Evaluate(e) => Stmt::Evaluate(widen_expr(e, width)),
    }
}

fn widen_expr_index(width: u8) -> impl Fn(&Expr) -> Expr {
    move |i: &Expr| {
        let w = widen_expr(i, width);
        if w.dtype().is_int() && w.dtype().bits() != width {
            Expr::cast(w.dtype().with_bits(width), w)
        } else {
            w
        }
    }
}

fn max_index_width(regions: &[BufferRegion]) -> u8 {
    let mut width = 32u8;
    for region in regions {
        for r in &region.region {
            for e in [&r.min, &r.extent] {
                if e.dtype().is_int() {
                    width = width.max(e.dtype().bits());
                }
            }
        }
    }
    width
}

fn replace_block(s: &Stmt, target_ptr: usize, new_block: Rc<Block>) -> Stmt {
    match s {
        Stmt::For { loop_var, min, extent, kind, body, thread_binding, annotations } => Stmt::For {
            loop_var: loop_var.clone(),
            min: min.clone(),
            extent: extent.clone(),
            kind: *kind,
            body: Rc::new(replace_block(body, target_ptr, new_block)),
            thread_binding: thread_binding.clone(),
            annotations: annotations.clone(),
        },
        Stmt::SeqStmt(stmts) => {
            Stmt::SeqStmt(stmts.iter().map(|s| Rc::new(replace_block(s, target_ptr, new_block.clone()))).collect())
        }
        Stmt::IfThenElse { condition, then_case, else_case } => Stmt::IfThenElse {
            condition: condition.clone(),
            then_case: Rc::new(replace_block(then_case, target_ptr, new_block.clone())),
            else_case: else_case.as_ref().map(|e| Rc::new(replace_block(e, target_ptr, new_block))),
        },
        Stmt::BlockRealizeStmt(br) => {
            if block_identity(&br.block) == target_ptr {
                Stmt::BlockRealizeStmt(Rc::new(crate::ir::BlockRealize::from_rc(
                    br.iter_values.clone(),
                    br.predicate.clone(),
                    new_block,
                )))
            } else {
                Stmt::BlockRealizeStmt(Rc::new(crate::ir::BlockRealize::from_rc(
                    br.iter_values.clone(),
                    br.predicate.clone(),
                    Rc::new(Block {
                        body: Rc::new(replace_block(&br.block.body, target_ptr, new_block)),
                        ..(*br.block).clone()
                    }),
                )))
            }
        }
        Stmt::BufferStore { .. } | Stmt::Evaluate(_) => s.clone(),
    }
}

#[tracing::instrument(skip(state, intrinsic))]
pub fn tensorize(
    state: &mut ScheduleState,
    sref: StmtSRef,
    intrinsic: &TensorIntrinsic,
    preserve_unit_iters: bool,
) -> Result<(), ScheduleError> {
    // Step A.
    let block_sref = if state.is_block_sref(sref) {
        sref
    } else {
        blockize(state, sref, preserve_unit_iters)?
    };
    let realize = state.get_block_realize(block_sref);

    // Step B.
    let mut regions = realize.block.reads.clone();
    regions.extend(realize.block.writes.clone());
    let width = max_index_width(&regions);
    if regions.is_empty() {
        return Err(ScheduleError::ContractViolation(
            "empty index-width scan: the matched block has neither reads nor writes".into(),
        ));
    }
    let normalized_impl_body = widen_stmt(&intrinsic.impl_.body, width);
    let mut impl_func = intrinsic.impl_.clone();
    impl_func.body = normalized_impl_body;

    // Step C.
    let mut matched = MatchResult::default();
    stmt_match(&intrinsic.desc.body, &Stmt::BlockRealizeStmt(Rc::new((*realize).clone())), &mut matched)?;

    let impl_realize = impl_func
        .body
        .as_single_block_realize()
        .ok_or_else(|| ScheduleError::ContractViolation("intrinsic implementation must have a single top-level block".into()))?;

    // Step D.
    let desc_buffers = intrinsic.desc.ordered_buffers();
    let impl_buffers = intrinsic.impl_.ordered_buffers();
    if desc_buffers.len() != impl_buffers.len() {
        return Err(ScheduleError::ContractViolation(
            "intrinsic descriptor and implementation must share the same buffer-parameter arity".into(),
        ));
    }

    let target_dtype = DataType::Int(width);
    let mut match_buffers = Vec::new();
    for (impl_buf, desc_buf) in impl_buffers.iter().zip(desc_buffers.iter()) {
        let current_buf = matched.buffer_map.get(&desc_buf.id()).ok_or_else(|| ScheduleError::StructuralMatchFailure {
            reason: format!("descriptor buffer {} was never accessed during structural match", desc_buf.name),
        })?;
        let indices = matched.base_indices.get(&desc_buf.id()).cloned().unwrap_or_default();
        let original_region = impl_realize
            .block
            .reads
            .iter()
            .chain(impl_realize.block.writes.iter())
            .find(|r| r.buffer.id() == impl_buf.id())
            .map(|r| r.region.clone())
            .unwrap_or_else(|| vec![Range::from_extent(Expr::int(1)); 0]);

        let offset = indices.len().saturating_sub(original_region.len());
        let mut new_region = Vec::with_capacity(indices.len());
        for (k, idx) in indices.iter().enumerate() {
            if k < offset {
                new_region.push(Range::new(idx.clone(), Expr::int(1)));
            } else {
                let dim = &original_region[k - offset];
                new_region.push(Range::new(
                    Expr::cast(target_dtype, idx.clone()),
                    Expr::cast(target_dtype, dim.extent.clone()),
                ));
            }
        }
        match_buffers.push(MatchBufferRegion::new(impl_buf.clone(), BufferRegion::new(current_buf.clone(), new_region)));
    }

    // Step F.
    let mut annotations = realize.block.annotations.clone();
    for (key, value) in &impl_realize.block.annotations {
        match annotations.get(key) {
            None => {
                annotations.insert(key.clone(), value.clone());
            }
            Some(existing) if existing != value => {
                tracing::warn!(block = %realize.block.name_hint, key, "tensorize annotation conflict, keeping existing value");
            }
            _ => {}
        }
    }

    let new_block = Rc::new(Block {
        iter_vars: realize.block.iter_vars.clone(),
        reads: realize.block.reads.clone(),
        writes: realize.block.writes.clone(),
        name_hint: realize.block.name_hint.clone(),
        body: impl_realize.block.body.clone(),
        init: None,
        alloc_buffers: realize.block.alloc_buffers.clone(),
        match_buffers,
        annotations,
    });

    // Step G.
    let block_name = state.name_hint(block_sref).to_string();
    let func_body = state.module.funcs[&state.func_name].body.clone();
    let new_body = replace_block(&func_body, block_identity(&realize.block), new_block.clone());
    state.replace(new_body, &[(realize.block.clone(), new_block)]);

    trace::record_tensorize(block_name, "intrinsic", preserve_unit_iters);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockRealize, DataType as DT, IrModule, IterType, IterVar, Var};

    fn mma_intrinsic() -> TensorIntrinsic {
        let i = Var::new("i", DT::I32);
        let j = Var::new("j", DT::I32);
        let k = Var::new("k", DT::I32);
        let a = crate::ir::Buffer::new("A", vec![Expr::int(16), Expr::int(16)], DT::I32);
        let b = crate::ir::Buffer::new("B", vec![Expr::int(16), Expr::int(16)], DT::I32);
        let c = crate::ir::Buffer::new("C", vec![Expr::int(16), Expr::int(16)], DT::I32);
        let desc_body = Stmt::BufferStore {
            buffer: c.clone(),
            indices: vec![Expr::var(i.clone()), Expr::var(j.clone())],
            value: Expr::add(
                Expr::BufferLoad(c.clone(), vec![Rc::new(Expr::var(i.clone())), Rc::new(Expr::var(j.clone()))]),
                Expr::mul(
                    Expr::BufferLoad(a.clone(), vec![Rc::new(Expr::var(i.clone())), Rc::new(Expr::var(k.clone()))]),
                    Expr::BufferLoad(b.clone(), vec![Rc::new(Expr::var(k.clone())), Rc::new(Expr::var(j.clone()))]),
                ),
            ),
        };
        let desc_block = Block::new(
            "mma_desc",
            vec![
                IterVar::new(Range::from_extent(Expr::int(16)), i.clone(), IterType::DataPar),
                IterVar::new(Range::from_extent(Expr::int(16)), j.clone(), IterType::DataPar),
                IterVar::new(Range::from_extent(Expr::int(16)), k.clone(), IterType::CommReduce),
            ],
            desc_body,
        )
        .with_reads(vec![BufferRegion::full(a.clone()), BufferRegion::full(b.clone()), BufferRegion::full(c.clone())])
        .with_writes(vec![BufferRegion::full(c.clone())]);
        let desc_realize = BlockRealize::new(vec![Expr::var(i.clone()), Expr::var(j.clone()), Expr::var(k.clone())], Expr::const_true(), desc_block);
        let (pa, pb, pc) = (Var::new("a", DT::I32), Var::new("b", DT::I32), Var::new("c", DT::I32));
        let mut desc = PrimFunc::new("mma_desc", vec![pa.clone(), pb.clone(), pc.clone()], Stmt::realize(desc_realize));
        desc.bind_buffer(&pa, a.clone());
        desc.bind_buffer(&pb, b.clone());
        desc.bind_buffer(&pc, c.clone());

        let impl_body = Stmt::Evaluate(Expr::int(0)); // opaque hardware call, stands in for the real intrinsic body
        let impl_block = Block::new(
            "mma_impl",
            vec![
                IterVar::new(Range::from_extent(Expr::int(16)), i, IterType::DataPar),
                IterVar::new(Range::from_extent(Expr::int(16)), j, IterType::DataPar),
                IterVar::new(Range::from_extent(Expr::int(16)), k, IterType::CommReduce),
            ],
            impl_body,
        )
        .with_reads(vec![BufferRegion::full(a.clone()), BufferRegion::full(b.clone()), BufferRegion::full(c.clone())])
        .with_writes(vec![BufferRegion::full(c.clone())]);
        let impl_realize = BlockRealize::new(vec![Expr::int(0), Expr::int(0), Expr::int(0)], Expr::const_true(), impl_block);
        let (qa, qb, qc) = (Var::new("a", DT::I32), Var::new("b", DT::I32), Var::new("c", DT::I32));
        let mut impl_func = PrimFunc::new("mma_impl", vec![qa.clone(), qb.clone(), qc.clone()], Stmt::realize(impl_realize));
        impl_func.bind_buffer(&qa, a.clone());
        impl_func.bind_buffer(&qb, b.clone());
        impl_func.bind_buffer(&qc, c.clone());

        TensorIntrinsic::new(desc, impl_func)
    }

    #[test]
    fn tensorize_rejects_a_structurally_different_block() {
        let intrinsic = mma_intrinsic();
        let i = Var::new("i", DT::I32);
        let c = crate::ir::Buffer::new("C", vec![Expr::int(16)], DT::I32);
        let block = Block::new(
            "not_mma",
            vec![IterVar::new(Range::from_extent(Expr::int(16)), i.clone(), IterType::DataPar)],
            Stmt::BufferStore { buffer: c.clone(), indices: vec![Expr::var(i.clone())], value: Expr::int(0) },
        )
        .with_writes(vec![BufferRegion::full(c)]);
        let realize = BlockRealize::new(vec![Expr::var(i.clone())], Expr::const_true(), block);
        let body = Stmt::realize(realize);
        let module = IrModule::new("m").with_func(PrimFunc::new("main", vec![], body));
        let mut state = ScheduleState::new(module, "main");
        let block_sref = state.root();
        let err = tensorize(&mut state, block_sref, &intrinsic, false).unwrap_err();
        assert!(matches!(err, ScheduleError::StructuralMatchFailure { .. }));
    }
}
