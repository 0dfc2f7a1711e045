//! Variable substitution over statements/expressions (SPEC_FULL §4.1): a
//! specialization of the generic `StmtMutator`/`ExprMutator` visitors that
//! overrides only the `Var` and `Block` cases. Every rewritten expression
//! is passed through the `Analyzer` simplifier; rewritten `Block`s are
//! recorded in a `reuse_map` so the schedule can re-link srefs without
//! rebuilding the whole tree.

use crate::analysis::simplify::Analyzer;
use crate::ir::visit::{ExprMutator, StmtMutator};
use crate::ir::{Block, BlockRealize, Expr, Stmt, Var};
use std::collections::HashMap;
use std::rc::Rc;

pub struct Substitute<'a> {
    map: &'a HashMap<u64, Expr>,
    analyzer: &'a Analyzer,
    /// `(old_block, new_block)` pairs recorded whenever a `Block` node is
    /// actually rewritten, per the out-parameter contract of §4.1.
    pub reuse_map: Vec<(Rc<Block>, Rc<Block>)>,
}

impl<'a> Substitute<'a> {
    pub fn new(map: &'a HashMap<u64, Expr>, analyzer: &'a Analyzer) -> Substitute<'a> {
        Substitute {
            map,
            analyzer,
            reuse_map: Vec::new(),
        }
    }

    pub fn expr(&mut self, e: &Expr) -> Expr {
        let rewritten = self.mutate_expr(e);
        self.analyzer.simplify(&rewritten)
    }

    pub fn stmt(&mut self, s: &Stmt) -> Stmt {
        self.mutate_stmt(s)
    }

    pub fn block_realize(&mut self, br: &BlockRealize) -> BlockRealize {
        BlockRealize::from_rc(
            br.iter_values.iter().map(|e| self.expr(e)).collect(),
            self.expr(&br.predicate),
            self.visit_block(&br.block),
        )
    }
}

impl<'a> ExprMutator for Substitute<'a> {
    fn visit_var(&mut self, v: &Var) -> Expr {
        match self.map.get(&v.id()) {
            Some(replacement) => replacement.clone(),
            None => Expr::Var(v.clone()),
        }
    }
}

impl<'a> StmtMutator for Substitute<'a> {
    fn visit_block(&mut self, b: &Block) -> Rc<Block> {
        let new_block = Rc::new(self.mutate_block_default(b));
        // `mutate_block_default` always allocates a fresh `Rc`, so pointer
        // identity can't tell us whether anything actually changed. Neither
        // `Block` nor `Stmt`/`Expr` implement structural `PartialEq` (`Var`
        // and `Buffer` compare by id, which is exactly what we don't want
        // here), so fall back to comparing their `Debug` renderings.
        if format!("{:?}", b) != format!("{:?}", new_block) {
            self.reuse_map.push((Rc::new(b.clone()), new_block.clone()));
        }
        new_block
    }
}

/// Rewrites `e` under `map`, returning the simplified result. A
/// convenience entry point for callers that don't need the `reuse_map`.
pub fn substitute_expr(e: &Expr, map: &HashMap<u64, Expr>, analyzer: &Analyzer) -> Expr {
    Substitute::new(map, analyzer).expr(e)
}

pub fn substitute_stmt(
    s: &Stmt,
    map: &HashMap<u64, Expr>,
    analyzer: &Analyzer,
) -> (Stmt, Vec<(Rc<Block>, Rc<Block>)>) {
    let mut sub = Substitute::new(map, analyzer);
    let out = sub.stmt(s);
    (out, sub.reuse_map)
}

pub fn substitute_block_realize(
    br: &BlockRealize,
    map: &HashMap<u64, Expr>,
    analyzer: &Analyzer,
) -> (BlockRealize, Vec<(Rc<Block>, Rc<Block>)>) {
    let mut sub = Substitute::new(map, analyzer);
    let out = sub.block_realize(br);
    (out, sub.reuse_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, IterType, IterVar, Range};

    #[test]
    fn substitutes_var_and_simplifies() {
        let analyzer = Analyzer::new();
        let x = Var::new("x", DataType::I32);
        let mut map = HashMap::new();
        map.insert(x.id(), Expr::int(5));
        let e = Expr::add(Expr::var(x.clone()), Expr::int(3));
        let out = substitute_expr(&e, &map, &analyzer);
        assert_eq!(out.as_int_const(), Some(8));
    }

    #[test]
    fn records_block_reuse_when_body_changes() {
        let analyzer = Analyzer::new();
        let i = Var::new("i", DataType::I32);
        let replacement = Var::new("i_o", DataType::I32);
        let block = Block::new(
            "b",
            vec![IterVar::new(
                Range::from_extent(Expr::int(128)),
                i.clone(),
                IterType::DataPar,
            )],
            Stmt::Evaluate(Expr::var(i.clone())),
        );
        let mut map = HashMap::new();
        map.insert(i.id(), Expr::var(replacement));
        let mut sub = Substitute::new(&map, &analyzer);
        let new_block = sub.visit_block(&block);
        assert_eq!(sub.reuse_map.len(), 1);
        match new_block.body.as_ref() {
            Stmt::Evaluate(Expr::Var(v)) => assert_eq!(v.name_hint, "i_o"),
            _ => panic!("expected rewritten body"),
        }
    }
}
