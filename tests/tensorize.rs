//! S6: blockize a 16x16x16 GEMM tile down to a single inner block, then
//! tensorize it against an MMA intrinsic whose impl has three buffer
//! parameters shaped [16,16].

use std::rc::Rc;
use tir_schedule_core::intrinsic::TensorIntrinsic;
use tir_schedule_core::ir::{
    Block, BlockRealize, Buffer, BufferRegion, DataType, Expr, ForKind, IrModule, IterType, IterVar, PrimFunc, Range, Stmt, Var,
};
use tir_schedule_core::schedule::ScheduleState;
use tir_schedule_core::{blockize, tensorize};

fn mma_intrinsic() -> TensorIntrinsic {
    let i = Var::new("i", DataType::I32);
    let j = Var::new("j", DataType::I32);
    let k = Var::new("k", DataType::I32);
    let a = Buffer::new("A", vec![Expr::int(16), Expr::int(16)], DataType::I32);
    let b = Buffer::new("B", vec![Expr::int(16), Expr::int(16)], DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(16), Expr::int(16)], DataType::I32);

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
    let (pa, pb, pc) = (Var::new("a", DataType::I32), Var::new("b", DataType::I32), Var::new("c", DataType::I32));
    let mut desc = PrimFunc::new("mma_desc", vec![pa.clone(), pb.clone(), pc.clone()], Stmt::realize(desc_realize));
    desc.bind_buffer(&pa, a.clone());
    desc.bind_buffer(&pb, b.clone());
    desc.bind_buffer(&pc, c.clone());

    let impl_body = Stmt::Evaluate(Expr::int(0));
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
    let (qa, qb, qc) = (Var::new("a", DataType::I32), Var::new("b", DataType::I32), Var::new("c", DataType::I32));
    let mut impl_func = PrimFunc::new("mma_impl", vec![qa.clone(), qb.clone(), qc.clone()], Stmt::realize(impl_realize));
    impl_func.bind_buffer(&qa, a.clone());
    impl_func.bind_buffer(&qb, b.clone());
    impl_func.bind_buffer(&qc, c.clone());

    TensorIntrinsic::new(desc, impl_func)
}

fn gemm_16_state() -> (ScheduleState, Var) {
    let i = Var::new("i", DataType::I32);
    let j = Var::new("j", DataType::I32);
    let k = Var::new("k", DataType::I32);
    let a = Buffer::new("A", vec![Expr::int(16), Expr::int(16)], DataType::I32);
    let b = Buffer::new("B", vec![Expr::int(16), Expr::int(16)], DataType::I32);
    let c = Buffer::new("C", vec![Expr::int(16), Expr::int(16)], DataType::I32);

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
            IterVar::new(Range::from_extent(Expr::int(16)), i.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(16)), j.clone(), IterType::DataPar),
            IterVar::new(Range::from_extent(Expr::int(16)), k.clone(), IterType::CommReduce),
        ],
        body,
    )
    .with_reads(vec![BufferRegion::full(a), BufferRegion::full(b), BufferRegion::full(c.clone())])
    .with_writes(vec![BufferRegion::full(c)]);
    let realize = BlockRealize::new(vec![Expr::var(i.clone()), Expr::var(j.clone()), Expr::var(k.clone())], Expr::const_true(), block);
    let nest = Stmt::wrap_loops(
        &[
            (i.clone(), Expr::int(0), Expr::int(16), ForKind::Serial),
            (j.clone(), Expr::int(0), Expr::int(16), ForKind::Serial),
            (k.clone(), Expr::int(0), Expr::int(16), ForKind::Serial),
        ],
        Stmt::realize(realize),
    );
    let module = IrModule::new("gemm16").with_func(PrimFunc::new("main", vec![], nest));
    (ScheduleState::new(module, "main"), i)
}

#[test]
fn s6_tensorize_splices_mma_impl_into_blockized_gemm_tile() {
    let (mut state, i) = gemm_16_state();
    let loop_sref = state.sref_of_loop(i.id()).unwrap();
    let outer_sref = blockize(&mut state, loop_sref, false).expect("16x16x16 GEMM divides trivially");

    let intrinsic = mma_intrinsic();
    tensorize(&mut state, outer_sref, &intrinsic, false).expect("the outer block structurally matches the MMA descriptor");

    let realize = state.get_block_realize(outer_sref);
    assert_eq!(realize.block.match_buffers.len(), 3, "A, B, C each get a MatchBufferRegion");

    let sources: Vec<&str> = realize.block.match_buffers.iter().map(|mb| mb.source.name.as_str()).collect();
    assert!(sources.contains(&"a"));
    assert!(sources.contains(&"b"));
    assert!(sources.contains(&"c"));

    for mb in &realize.block.match_buffers {
        assert_eq!(mb.target.region.len(), 2, "each matched region covers the buffer's two dims");
        for dim in &mb.target.region {
            assert!(matches!(dim.extent, Expr::Cast(..)), "extents are cast to the normalized index width");
        }
    }

    // The block body is now the intrinsic's opaque hardware-call stand-in,
    // not the original multiply-accumulate.
    let body_str = format!("{}", realize.block.body);
    assert!(!body_str.contains('+'), "body was replaced by the intrinsic implementation");
}
