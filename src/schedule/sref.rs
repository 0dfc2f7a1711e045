//! The sref tree (SPEC_FULL §3, §9 "Tree with back-references"): a
//! `Vec`-backed arena of stable `usize` indices rather than a graph of
//! `Rc`/`Weak` cycles, mirroring this crate's own `StmtSRef` guidance and
//! the teacher's `Vec`-indexed `SSACFG`/`Graph` arena style.

use crate::ir::Block;
use std::rc::Rc;

/// A stable handle into a `ScheduleState`'s sref arena.
pub type StmtSRef = usize;

#[derive(Clone, Debug)]
pub enum SRefNode {
    /// Identity is the loop variable's arena id.
    Loop { var_id: u64, name_hint: String },
    /// Identity is the `Block`'s `Rc` allocation, since `Block` itself
    /// carries no id field (unlike `Var`/`Buffer`).
    Block { ptr: usize, name_hint: String },
}

impl SRefNode {
    pub fn name_hint(&self) -> &str {
        match self {
            SRefNode::Loop { name_hint, .. } => name_hint,
            SRefNode::Block { name_hint, .. } => name_hint,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, SRefNode::Block { .. })
    }
}

pub fn block_identity(b: &Rc<Block>) -> usize {
    Rc::as_ptr(b) as usize
}

#[derive(Clone, Debug, Default)]
pub struct SRefTree {
    pub nodes: Vec<SRefNode>,
    pub parent: Vec<Option<StmtSRef>>,
    pub children: Vec<Vec<StmtSRef>>,
}

impl SRefTree {
    pub fn push(&mut self, node: SRefNode, parent: Option<StmtSRef>) -> StmtSRef {
        let idx = self.nodes.len();
        self.nodes.push(node);
        self.parent.push(parent);
        self.children.push(Vec::new());
        if let Some(p) = parent {
            self.children[p].push(idx);
        }
        idx
    }

    pub fn ancestors(&self, mut sref: StmtSRef) -> Vec<StmtSRef> {
        let mut out = vec![sref];
        while let Some(p) = self.parent[sref] {
            out.push(p);
            sref = p;
        }
        out
    }

    /// The nearest ancestor (inclusive) that is a `Block` node, or `None`
    /// if `sref` has no block ancestor (it sits directly under the root).
    pub fn nearest_block(&self, sref: StmtSRef) -> Option<StmtSRef> {
        self.ancestors(sref).into_iter().find(|&s| self.nodes[s].is_block())
    }

    pub fn lowest_common_ancestor(&self, srefs: &[StmtSRef]) -> StmtSRef {
        assert!(!srefs.is_empty(), "lowest_common_ancestor of an empty set");
        let mut common = self.ancestors(srefs[0]);
        for &s in &srefs[1..] {
            let chain = self.ancestors(s);
            common.retain(|c| chain.contains(c));
        }
        // `ancestors` walks leaf-to-root, so the first surviving entry is
        // the deepest common ancestor.
        common[0]
    }
}
