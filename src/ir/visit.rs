//! Polymorphic IR visitors, implemented as tagged-variant dispatch over the
//! `Stmt`/`Expr` enums (SPEC_FULL §9 "Polymorphic IR visitors"): a trait
//! with a default recursive method per variant, specialized by overriding
//! only the cases a particular pass cares about. `substitute::Substitute`
//! is the motivating specialization: it overrides `visit_var` and
//! `visit_block` and inherits every other case's structural recursion.

use crate::ir::{Block, BlockRealize, Expr, Stmt, Var};
use std::rc::Rc;

/// Rebuilds expressions bottom-up. Override individual `visit_*` hooks to
/// specialize; `mutate_expr` drives the dispatch and default recursion.
pub trait ExprMutator {
    fn visit_var(&mut self, v: &Var) -> Expr {
        Expr::Var(v.clone())
    }

    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        match e {
            Expr::IntImm(..) | Expr::FloatImm(..) | Expr::BoolImm(_) => e.clone(),
            Expr::Var(v) => self.visit_var(v),
            Expr::Add(a, b) => Expr::add(self.mutate_expr(a), self.mutate_expr(b)),
            Expr::Sub(a, b) => Expr::sub(self.mutate_expr(a), self.mutate_expr(b)),
            Expr::Mul(a, b) => Expr::mul(self.mutate_expr(a), self.mutate_expr(b)),
            Expr::FloorDiv(a, b) => Expr::floordiv(self.mutate_expr(a), self.mutate_expr(b)),
            Expr::FloorMod(a, b) => Expr::floormod(self.mutate_expr(a), self.mutate_expr(b)),
            Expr::Min(a, b) => Expr::Min(Rc::new(self.mutate_expr(a)), Rc::new(self.mutate_expr(b))),
            Expr::Max(a, b) => Expr::Max(Rc::new(self.mutate_expr(a)), Rc::new(self.mutate_expr(b))),
            Expr::Cmp(op, a, b) => {
                Expr::Cmp(*op, Rc::new(self.mutate_expr(a)), Rc::new(self.mutate_expr(b)))
            }
            Expr::And(a, b) => Expr::And(Rc::new(self.mutate_expr(a)), Rc::new(self.mutate_expr(b))),
            Expr::Or(a, b) => Expr::Or(Rc::new(self.mutate_expr(a)), Rc::new(self.mutate_expr(b))),
            Expr::Not(a) => Expr::Not(Rc::new(self.mutate_expr(a))),
            Expr::Select(c, t, f) => Expr::Select(
                Rc::new(self.mutate_expr(c)),
                Rc::new(self.mutate_expr(t)),
                Rc::new(self.mutate_expr(f)),
            ),
            Expr::BufferLoad(buf, indices) => Expr::BufferLoad(
                buf.clone(),
                indices.iter().map(|i| Rc::new(self.mutate_expr(i))).collect(),
            ),
            Expr::Cast(dt, a) => Expr::Cast(*dt, Rc::new(self.mutate_expr(a))),
        }
    }
}

/// Rebuilds statements (and, through `ExprMutator`, expressions) bottom-up.
pub trait StmtMutator: ExprMutator {
    fn visit_block(&mut self, b: &Block) -> Rc<Block> {
        Rc::new(self.mutate_block_default(b))
    }

    fn mutate_block_default(&mut self, b: &Block) -> Block {
        Block {
            iter_vars: b.iter_vars.clone(),
            reads: b.reads.clone(),
            writes: b.writes.clone(),
            name_hint: b.name_hint.clone(),
            body: Rc::new(self.mutate_stmt(&b.body)),
            init: b.init.as_ref().map(|s| Rc::new(self.mutate_stmt(s))),
            alloc_buffers: b.alloc_buffers.clone(),
            match_buffers: b.match_buffers.clone(),
            annotations: b.annotations.clone(),
        }
    }

    fn mutate_block_realize(&mut self, br: &BlockRealize) -> BlockRealize {
        BlockRealize::from_rc(
            br.iter_values.iter().map(|e| self.mutate_expr(e)).collect(),
            self.mutate_expr(&br.predicate),
            self.visit_block(&br.block),
        )
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s {
            Stmt::For {
                loop_var,
                min,
                extent,
                kind,
                body,
                thread_binding,
                annotations,
            } => Stmt::For {
                loop_var: loop_var.clone(),
                min: self.mutate_expr(min),
                extent: self.mutate_expr(extent),
                kind: *kind,
                body: Rc::new(self.mutate_stmt(body)),
                thread_binding: thread_binding.clone(),
                annotations: annotations.clone(),
            },
            Stmt::SeqStmt(stmts) => {
                Stmt::SeqStmt(stmts.iter().map(|s| Rc::new(self.mutate_stmt(s))).collect())
            }
            Stmt::IfThenElse {
                condition,
                then_case,
                else_case,
            } => Stmt::IfThenElse {
                condition: self.mutate_expr(condition),
                then_case: Rc::new(self.mutate_stmt(then_case)),
                else_case: else_case.as_ref().map(|s| Rc::new(self.mutate_stmt(s))),
            },
            Stmt::BlockRealizeStmt(br) => {
                Stmt::BlockRealizeStmt(Rc::new(self.mutate_block_realize(br)))
            }
            Stmt::BufferStore {
                buffer,
                indices,
                value,
            } => Stmt::BufferStore {
                buffer: buffer.clone(),
                indices: indices.iter().map(|i| self.mutate_expr(i)).collect(),
                value: self.mutate_expr(value),
            },
            Stmt::Evaluate(e) => Stmt::Evaluate(self.mutate_expr(e)),
        }
    }
}
