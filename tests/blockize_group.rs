//! S4 (group-blockize two consecutive sibling blocks) and S5 (rejecting a
//! non-consecutive group).

use std::rc::Rc;
use tir_schedule_core::blockize_group;
use tir_schedule_core::error::ScheduleError;
use tir_schedule_core::ir::{Block, BlockRealize, Buffer, BufferRegion, DataType, Expr, ForKind, IrModule, IterType, IterVar, PrimFunc, Range, Stmt, Var};
use tir_schedule_core::schedule::ScheduleState;

fn sibling_block(name: &str, i: &Var, buf: &Buffer, value: i64) -> Rc<Block> {
    Rc::new(
        Block::new(
            name,
            vec![IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar)],
            Stmt::BufferStore { buffer: buf.clone(), indices: vec![Expr::var(i.clone())], value: Expr::int(value) },
        )
        .with_writes(vec![BufferRegion::full(buf.clone())]),
    )
}

#[test]
fn s4_group_blockize_two_siblings_produces_one_outer_block() {
    let i = Var::new("i", DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(128)], DataType::I32);
    let d = Buffer::new("D", vec![Expr::int(128)], DataType::I32);
    let b1 = sibling_block("B1", &i, &c, 1);
    let b2 = sibling_block("B2", &i, &d, 2);
    let r1 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b1.clone());
    let r2 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b2.clone());
    let seq = Stmt::seq(vec![Stmt::realize(r1), Stmt::realize(r2)]);
    let nest = Stmt::for_(i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial, seq);
    let module = IrModule::new("group").with_func(PrimFunc::new("main", vec![], nest));
    let mut state = ScheduleState::new(module, "main");

    let srefs = vec![state.sref_of_block(&b1).unwrap(), state.sref_of_block(&b2).unwrap()];
    let outer_sref = blockize_group(&mut state, &srefs, false).expect("B1,B2 are consecutive siblings");

    assert!(state.is_block_sref(outer_sref));
    let outer = state.get_block_realize(outer_sref);
    assert_eq!(outer.block.name_hint, "outer_B1_B2_");

    match &*outer.block.body {
        Stmt::SeqStmt(stmts) => assert_eq!(stmts.len(), 2, "outer body wraps both inner realizations"),
        other => panic!("expected a SeqStmt of the two inner block realizations, got {:?}", other),
    }

    let writes: Vec<&str> = outer.block.writes.iter().map(|r| r.buffer.name.as_str()).collect();
    assert!(writes.contains(&"C"));
    assert!(writes.contains(&"D"));
}

#[test]
fn s5_group_blockize_non_consecutive_blocks_is_rejected() {
    let i = Var::new("i", DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(128)], DataType::I32);
    let x = Buffer::new("X", vec![Expr::int(128)], DataType::I32);
    let d = Buffer::new("D", vec![Expr::int(128)], DataType::I32);
    let b1 = sibling_block("B1", &i, &c, 1);
    let bx = sibling_block("X", &i, &x, 9);
    let b2 = sibling_block("B2", &i, &d, 2);
    let r1 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b1.clone());
    let rx = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), bx.clone());
    let r2 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b2.clone());
    let seq = Stmt::seq(vec![Stmt::realize(r1), Stmt::realize(rx), Stmt::realize(r2)]);
    let nest = Stmt::for_(i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial, seq);
    let module = IrModule::new("group2").with_func(PrimFunc::new("main", vec![], nest));
    let mut state = ScheduleState::new(module, "main");

    let srefs = vec![state.sref_of_block(&b1).unwrap(), state.sref_of_block(&b2).unwrap()];
    let err = blockize_group(&mut state, &srefs, false).expect_err("B1 and B2 are separated by X");
    match err {
        ScheduleError::ContractViolation(msg) => assert_eq!(msg, "Target blocks must be consecutive!"),
        other => panic!("expected ContractViolation, got {:?}", other),
    }
}
