//! A constant-folding/normalizing `Analyzer`: the concrete stand-in named
//! by SPEC_FULL's "Arithmetic simplifier" component. The spec treats the
//! real analyzer as an external collaborator and only requires that IR
//! Substitute and region relaxation can call `simplify` on a rewritten
//! expression and get back an equivalent, no-worse-than-as-simple form.

use crate::ir::{CmpOp, Expr, Range, Var};
use std::collections::HashMap;

/// Per-transformation scratchpad (§5): allocated fresh at each primitive
/// entry point, optionally told about known iterator domains via `bind`,
/// discarded at return.
#[derive(Default)]
pub struct Analyzer {
    domains: HashMap<u64, Range>,
}

impl Analyzer {
    pub fn new() -> Analyzer {
        Analyzer::default()
    }

    /// Records that `var` ranges over `domain`, for later use by simplifier
    /// rules that fold a var to a constant when its domain is a singleton.
    pub fn bind(&mut self, var: &Var, domain: Range) {
        self.domains.insert(var.id(), domain);
    }

    pub fn simplify(&self, e: &Expr) -> Expr {
        match e {
            Expr::IntImm(..) | Expr::FloatImm(..) | Expr::BoolImm(_) => e.clone(),
            Expr::Var(v) => {
                if let Some(dom) = self.domains.get(&v.id()) {
                    if let (Some(min), Some(extent)) =
                        (dom.min.as_int_const(), dom.extent.as_int_const())
                    {
                        if extent == 1 {
                            return Expr::IntImm(min, v.dtype);
                        }
                    }
                }
                e.clone()
            }
            Expr::Add(a, b) => self.fold_add(self.simplify(a), self.simplify(b)),
            Expr::Sub(a, b) => self.fold_sub(self.simplify(a), self.simplify(b)),
            Expr::Mul(a, b) => self.fold_mul(self.simplify(a), self.simplify(b)),
            Expr::FloorDiv(a, b) => self.fold_floordiv(self.simplify(a), self.simplify(b)),
            Expr::FloorMod(a, b) => self.fold_floormod(self.simplify(a), self.simplify(b)),
            Expr::Min(a, b) => {
                let (a, b) = (self.simplify(a), self.simplify(b));
                match (a.as_int_const(), b.as_int_const()) {
                    (Some(x), Some(y)) => Expr::IntImm(x.min(y), a.dtype()),
                    _ => Expr::Min(a.into(), b.into()),
                }
            }
            Expr::Max(a, b) => {
                let (a, b) = (self.simplify(a), self.simplify(b));
                match (a.as_int_const(), b.as_int_const()) {
                    (Some(x), Some(y)) => Expr::IntImm(x.max(y), a.dtype()),
                    _ => Expr::Max(a.into(), b.into()),
                }
            }
            Expr::Cmp(op, a, b) => self.fold_cmp(*op, self.simplify(a), self.simplify(b)),
            Expr::And(a, b) => {
                let (a, b) = (self.simplify(a), self.simplify(b));
                match (bool_const(&a), bool_const(&b)) {
                    (Some(false), _) | (_, Some(false)) => Expr::BoolImm(false),
                    (Some(true), _) => b,
                    (_, Some(true)) => a,
                    _ => Expr::And(a.into(), b.into()),
                }
            }
            Expr::Or(a, b) => {
                let (a, b) = (self.simplify(a), self.simplify(b));
                match (bool_const(&a), bool_const(&b)) {
                    (Some(true), _) | (_, Some(true)) => Expr::BoolImm(true),
                    (Some(false), _) => b,
                    (_, Some(false)) => a,
                    _ => Expr::Or(a.into(), b.into()),
                }
            }
            Expr::Not(a) => {
                let a = self.simplify(a);
                match bool_const(&a) {
                    Some(v) => Expr::BoolImm(!v),
                    None => Expr::Not(a.into()),
                }
            }
            Expr::Select(c, t, f) => {
                let c = self.simplify(c);
                match bool_const(&c) {
                    Some(true) => self.simplify(t),
                    Some(false) => self.simplify(f),
                    None => Expr::Select(c.into(), self.simplify(t).into(), self.simplify(f).into()),
                }
            }
            Expr::BufferLoad(buf, indices) => Expr::BufferLoad(
                buf.clone(),
                indices.iter().map(|i| self.simplify(i).into()).collect(),
            ),
            Expr::Cast(dt, a) => {
                let a = self.simplify(a);
                match a.as_int_const() {
                    Some(v) => Expr::IntImm(v, *dt),
                    None => Expr::Cast(*dt, a.into()),
                }
            }
        }
    }

    fn fold_add(&self, a: Expr, b: Expr) -> Expr {
        match (a.as_int_const(), b.as_int_const()) {
            (Some(0), _) => b,
            (_, Some(0)) => a,
            (Some(x), Some(y)) => Expr::IntImm(x + y, a.dtype()),
            _ => Expr::add(a, b),
        }
    }

    fn fold_sub(&self, a: Expr, b: Expr) -> Expr {
        match (a.as_int_const(), b.as_int_const()) {
            (_, Some(0)) => a,
            (Some(x), Some(y)) => Expr::IntImm(x - y, a.dtype()),
            _ => Expr::sub(a, b),
        }
    }

    fn fold_mul(&self, a: Expr, b: Expr) -> Expr {
        match (a.as_int_const(), b.as_int_const()) {
            (Some(0), _) | (_, Some(0)) => Expr::IntImm(0, a.dtype()),
            (Some(1), _) => b,
            (_, Some(1)) => a,
            (Some(x), Some(y)) => Expr::IntImm(x * y, a.dtype()),
            _ => Expr::mul(a, b),
        }
    }

    fn fold_floordiv(&self, a: Expr, b: Expr) -> Expr {
        match (a.as_int_const(), b.as_int_const()) {
            (_, Some(1)) => a,
            (Some(x), Some(y)) if y != 0 => Expr::IntImm(x.div_euclid(y), a.dtype()),
            _ => Expr::floordiv(a, b),
        }
    }

    fn fold_floormod(&self, a: Expr, b: Expr) -> Expr {
        match (a.as_int_const(), b.as_int_const()) {
            (_, Some(1)) => Expr::IntImm(0, a.dtype()),
            (Some(x), Some(y)) if y != 0 => Expr::IntImm(x.rem_euclid(y), a.dtype()),
            _ => Expr::floormod(a, b),
        }
    }

    fn fold_cmp(&self, op: CmpOp, a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_int_const(), b.as_int_const()) {
            let v = match op {
                CmpOp::Eq => x == y,
                CmpOp::Ne => x != y,
                CmpOp::Lt => x < y,
                CmpOp::Le => x <= y,
                CmpOp::Gt => x > y,
                CmpOp::Ge => x >= y,
            };
            Expr::BoolImm(v)
        } else {
            Expr::Cmp(op, a.into(), b.into())
        }
    }
}

fn bool_const(e: &Expr) -> Option<bool> {
    match e {
        Expr::BoolImm(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DataType;

    #[test]
    fn folds_constant_arithmetic() {
        let a = Analyzer::new();
        let e = Expr::add(Expr::int(2), Expr::mul(Expr::int(3), Expr::int(4)));
        assert_eq!(a.simplify(&e).as_int_const(), Some(14));
    }

    #[test]
    fn drops_additive_identity() {
        let a = Analyzer::new();
        let v = Expr::var(Var::new("x", DataType::I32));
        let e = Expr::add(v.clone(), Expr::int(0));
        match a.simplify(&e) {
            Expr::Var(out) => assert_eq!(out.name_hint, "x"),
            other => panic!("expected bare var, got {:?}", other),
        }
    }

    #[test]
    fn binds_singleton_domain_to_constant() {
        let mut a = Analyzer::new();
        let v = Var::new("i_o", DataType::I32);
        a.bind(&v, Range::from_extent(Expr::int(1)));
        let e = Expr::var(v);
        assert_eq!(a.simplify(&e).as_int_const(), Some(0));
    }
}
