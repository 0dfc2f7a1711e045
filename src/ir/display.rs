//! Colorized, indented `Display` impls (SPEC_FULL §4.10), in the style of
//! the pretty-printers this crate's rendering is modeled on: `yansi::Paint`
//! for syntax color, `indenter::indented` for nested block bodies.

use crate::ir::{Block, BlockRealize, CmpOp, Expr, ForKind, Stmt, Var};
use indenter::indented;
use std::fmt::{self, Write};
use yansi::Paint;

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", Paint::cyan(&self.name_hint))
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::IntImm(v, _) => write!(f, "{}", Paint::yellow(v)),
            Expr::FloatImm(v, _) => write!(f, "{}", Paint::yellow(v)),
            Expr::BoolImm(v) => write!(f, "{}", Paint::yellow(v)),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::FloorDiv(a, b) => write!(f, "floordiv({}, {})", a, b),
            Expr::FloorMod(a, b) => write!(f, "floormod({}, {})", a, b),
            Expr::Min(a, b) => write!(f, "min({}, {})", a, b),
            Expr::Max(a, b) => write!(f, "max({}, {})", a, b),
            Expr::Cmp(op, a, b) => write!(f, "({} {} {})", a, op, b),
            Expr::And(a, b) => write!(f, "({} && {})", a, b),
            Expr::Or(a, b) => write!(f, "({} || {})", a, b),
            Expr::Not(a) => write!(f, "!{}", a),
            Expr::Select(c, t, e) => write!(f, "select({}, {}, {})", c, t, e),
            Expr::BufferLoad(buf, indices) => {
                write!(f, "{}[", Paint::green(&buf.name))?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, "]")
            }
            Expr::Cast(dt, a) => write!(f, "cast({}, {})", dt, a),
        }
    }
}

impl fmt::Display for ForKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ForKind::Serial => "serial",
            ForKind::Parallel => "parallel",
            ForKind::Vectorized => "vectorized",
            ForKind::Unrolled => "unrolled",
        };
        write!(f, "{}", Paint::magenta(s))
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stmt::For {
                loop_var,
                min,
                extent,
                kind,
                body,
                ..
            } => {
                writeln!(
                    f,
                    "{} {} in [{}, {}) {{",
                    kind,
                    loop_var,
                    min,
                    Expr::add(min.clone(), extent.clone())
                )?;
                write!(indented(f), "{}", body)?;
                write!(f, "}}")
            }
            Stmt::SeqStmt(stmts) => {
                for s in stmts {
                    writeln!(f, "{}", s)?;
                }
                Ok(())
            }
            Stmt::IfThenElse {
                condition,
                then_case,
                else_case,
            } => {
                writeln!(f, "if {} {{", condition)?;
                write!(indented(f), "{}", then_case)?;
                writeln!(f, "}}")?;
                if let Some(e) = else_case {
                    writeln!(f, "else {{")?;
                    write!(indented(f), "{}", e)?;
                    writeln!(f, "}}")?;
                }
                Ok(())
            }
            Stmt::BlockRealizeStmt(br) => write!(f, "{}", br),
            Stmt::BufferStore {
                buffer,
                indices,
                value,
            } => {
                write!(f, "{}[", Paint::green(&buffer.name))?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, "] = {}", value)
            }
            Stmt::Evaluate(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} {} {{", Paint::new("block").bold(), Paint::green(&self.name_hint))?;
        {
            let mut ind = indented(f);
            for iv in &self.iter_vars {
                writeln!(
                    ind,
                    "iter {}: {} in [{}, {})",
                    iv.iter_type, iv.var, iv.domain.min, iv.domain.extent
                )?;
            }
            for r in &self.reads {
                writeln!(ind, "reads {}", r.buffer.name)?;
            }
            for w in &self.writes {
                writeln!(ind, "writes {}", w.buffer.name)?;
            }
            if let Some(init) = &self.init {
                writeln!(ind, "init {{")?;
                write!(indented(&mut ind), "{}", init)?;
                writeln!(ind, "}}")?;
            }
            write!(ind, "{}", self.body)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for BlockRealize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", Paint::new("realize").bold())?;
        for (i, v) in self.iter_values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        writeln!(f, ") where {}", self.predicate)?;
        write!(f, "{}", self.block)
    }
}
