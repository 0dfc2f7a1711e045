//! Demo harness (SPEC_FULL §4.11): builds one of the S1/S3/S4/S6 example
//! programs by name and prints what Blockize/Tensorize does to it.

use std::rc::Rc;
use tir_schedule_core::ir::{
    Block, BlockRealize, Buffer, BufferRegion, DataType, Expr, ForKind, IrModule, IterType, IterVar, PrimFunc, Range, Stmt, Var,
};
use tir_schedule_core::schedule::ScheduleState;
use tir_schedule_core::{blockize, blockize_group};

fn gemm_state() -> (ScheduleState, Var) {
    let i = Var::new("i", DataType::I32);
    let j = Var::new("j", DataType::I32);
    let k = Var::new("k", DataType::I32);
    let a = Buffer::new("A", vec![Expr::int(128), Expr::int(128)], DataType::I32);
    let b = Buffer::new("B", vec![Expr::int(128), Expr::int(128)], DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(128), Expr::int(128)], DataType::I32);

    let body = Stmt::BufferStore {
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
    let block = Block::new(
        "C",
        vec![
            IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(128)), j.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(128)), k.clone(), IterType::CommReduce),
        ],
        body,
    )
    .with_reads(vec![BufferRegion::full(a), BufferRegion::full(b), BufferRegion::full(c.clone())])
    .with_writes(vec![BufferRegion::full(c)]);
    let realize = BlockRealize::new(vec![Expr::var(i.clone()), Expr::var(j.clone()), Expr::var(k.clone())], Expr::const_true(), block);
    let nest = Stmt::wrap_loops(
        &[
            (i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial),
            (j.clone(), Expr::int(0), Expr::int(128), ForKind::Serial),
            (k.clone(), Expr::int(0), Expr::int(128), ForKind::Serial),
        ],
        Stmt::realize(realize),
    );
    let module = IrModule::new("demo").with_func(PrimFunc::new("main", vec![], nest));
    (ScheduleState::new(module, "main"), i)
}

fn scenario_s1() {
    let (mut state, i) = gemm_state();
    let loop_sref = state.sref_of_loop(i.id()).unwrap();
    match blockize(&mut state, loop_sref, false) {
        Ok(sref) => println!("S1: blockize on loop i succeeded\n{}", state.get_block_realize(sref)),
        Err(e) => println!("S1: unexpected failure: {}", e.long_message()),
    }
}

fn scenario_s3() {
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
    let module = IrModule::new("demo").with_func(PrimFunc::new("main", vec![], nest));
    let mut state = ScheduleState::new(module, "main");
    let loop_sref = state.sref_of_loop(k.id()).unwrap();
    match blockize(&mut state, loop_sref, false) {
        Ok(sref) => println!("S3: blockize on reduction loop k succeeded\n{}", state.get_block_realize(sref)),
        Err(e) => println!("S3: unexpected failure: {}", e.long_message()),
    }
}

fn scenario_s4() {
    let i = Var::new("i", DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(128)], DataType::I32);
    let d = Buffer::new("D", vec![Expr::int(128)], DataType::I32);
    let b1 = Rc::new(
        Block::new(
            "B1",
            vec![IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar)],
            Stmt::BufferStore { buffer: c.clone(), indices: vec![Expr::var(i.clone())], value: Expr::int(1) },
        )
        .with_writes(vec![BufferRegion::full(c)]),
    );
    let b2 = Rc::new(
        Block::new(
            "B2",
            vec![IterVar::new(Range::from_extent(Expr::int(128)), i.clone(), IterType::DataPar)],
            Stmt::BufferStore { buffer: d.clone(), indices: vec![Expr::var(i.clone())], value: Expr::int(2) },
        )
        .with_writes(vec![BufferRegion::full(d)]),
    );
    let r1 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b1.clone());
    let r2 = BlockRealize::from_rc(vec![Expr::var(i.clone())], Expr::const_true(), b2.clone());
    let seq = Stmt::seq(vec![Stmt::realize(r1), Stmt::realize(r2)]);
    let nest = Stmt::for_(i.clone(), Expr::int(0), Expr::int(128), ForKind::Serial, seq);
    let module = IrModule::new("demo").with_func(PrimFunc::new("main", vec![], nest));
    let mut state = ScheduleState::new(module, "main");
    let block_srefs = vec![state.sref_of_block(&b1).unwrap(), state.sref_of_block(&b2).unwrap()];
    match blockize_group(&mut state, &block_srefs, false) {
        Ok(sref) => println!("S4: group blockize over B1,B2 succeeded\n{}", state.get_block_realize(sref)),
        Err(e) => println!("S4: unexpected failure: {}", e.long_message()),
    }
}

fn scenario_s6() {
    println!("S6: tensorize against an MMA intrinsic is exercised in tests/tensorize.rs; this demo covers S1/S3/S4 end-to-end printing only.");
}

fn main() {
    tir_schedule_core::diagnostics::install();
    let mut args = std::env::args().skip(1);
    let mut scenario = None;
    while let Some(a) = args.next() {
        if let Some(inline) = a.strip_prefix("--scenario=") {
            scenario = Some(inline.to_string());
        } else if a == "--scenario" {
            scenario = args.next();
        }
    }

    match scenario.as_deref() {
        Some("s1") => scenario_s1(),
        Some("s3") => scenario_s3(),
        Some("s4") => scenario_s4(),
        Some("s6") => scenario_s6(),
        _ => {
            eprintln!("usage: scheduler-demo --scenario <s1|s3|s4|s6>");
            std::process::exit(1);
        }
    }
}
