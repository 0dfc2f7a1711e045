use crate::ir::{BlockRealize, Expr, Var};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForKind {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
}

/// A closed enum standing in for the block annotation payload (see
/// SPEC_FULL §3.1): closed rather than an open trait-object registry
/// because nothing in this crate ever downcasts an annotation to a
/// domain-specific type, it only compares whole values during the
/// warn-and-keep merge in Tensorize (§4.8 Step F).
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationValue {
    Int(i64),
    Str(String),
    Bool(bool),
    IntArray(Vec<i64>),
}

pub type Annotations = HashMap<String, AnnotationValue>;

/// Statement nodes. Loop bodies and `SeqStmt` children are `Rc`-shared so
/// a rewrite only needs to clone the spine it actually touches.
#[derive(Clone, Debug)]
pub enum Stmt {
    /// `loop_var` ranges over `[min, min + extent)`.
    For {
        loop_var: Var,
        min: Expr,
        extent: Expr,
        kind: ForKind,
        body: Rc<Stmt>,
        thread_binding: Option<String>,
        annotations: Annotations,
    },
    SeqStmt(Vec<Rc<Stmt>>),
    IfThenElse {
        condition: Expr,
        then_case: Rc<Stmt>,
        else_case: Option<Rc<Stmt>>,
    },
    BlockRealizeStmt(Rc<BlockRealize>),
    /// `buffer[indices] = value`, used by the init subtree (e.g. `C = 0`).
    BufferStore {
        buffer: crate::ir::Buffer,
        indices: Vec<Expr>,
        value: Expr,
    },
    Evaluate(Expr),
}

impl Stmt {
    pub fn for_(
        loop_var: Var,
        min: Expr,
        extent: Expr,
        kind: ForKind,
        body: Stmt,
    ) -> Stmt {
        Stmt::For {
            loop_var,
            min,
            extent,
            kind,
            body: Rc::new(body),
            thread_binding: None,
            annotations: Annotations::new(),
        }
    }

    pub fn seq(stmts: Vec<Stmt>) -> Stmt {
        Stmt::SeqStmt(stmts.into_iter().map(Rc::new).collect())
    }

    pub fn realize(br: BlockRealize) -> Stmt {
        Stmt::BlockRealizeStmt(Rc::new(br))
    }

    /// Wraps `body` in loop nests cloned from `loops`, outermost first,
    /// as used when reconstructing the inner-loop nest around a
    /// `BlockRealize` (§4.6 Step F) or the init loop nest (§4.5).
    pub fn wrap_loops(loops: &[(Var, Expr, Expr, ForKind)], body: Stmt) -> Stmt {
        let mut acc = body;
        for (loop_var, min, extent, kind) in loops.iter().rev() {
            acc = Stmt::for_(loop_var.clone(), min.clone(), extent.clone(), *kind, acc);
        }
        acc
    }

    /// The block realizes appearing as immediate children of a `SeqStmt`
    /// body, or the single realize if `self` is itself one, used when
    /// asserting a loop has a unique child `BlockRealize` (§4.6 Step A).
    pub fn as_single_block_realize(&self) -> Option<&Rc<BlockRealize>> {
        match self {
            Stmt::BlockRealizeStmt(br) => Some(br),
            Stmt::SeqStmt(stmts) if stmts.len() == 1 => stmts[0].as_single_block_realize(),
            _ => None,
        }
    }

    /// Free vars occurring anywhere in a statement (a loop's own `min`
    /// and `extent` count as uses; `loop_var` itself is a binder, not a
    /// use). Used by the outer-init generator (§4.5) to find which inner
    /// iter vars an init body actually references.
    pub fn free_vars(&self, out: &mut Vec<Var>) {
        match self {
            Stmt::For { min, extent, body, .. } => {
                min.free_vars(out);
                extent.free_vars(out);
                body.free_vars(out);
            }
            Stmt::SeqStmt(stmts) => {
                for s in stmts {
                    s.free_vars(out);
                }
            }
            Stmt::IfThenElse { condition, then_case, else_case } => {
                condition.free_vars(out);
                then_case.free_vars(out);
                if let Some(e) = else_case {
                    e.free_vars(out);
                }
            }
            Stmt::BlockRealizeStmt(br) => {
                for v in &br.iter_values {
                    v.free_vars(out);
                }
                br.predicate.free_vars(out);
            }
            Stmt::BufferStore { indices, value, .. } => {
                for i in indices {
                    i.free_vars(out);
                }
                value.free_vars(out);
            }
            Stmt::Evaluate(e) => e.free_vars(out),
        }
    }
}
