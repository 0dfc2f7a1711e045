use crate::ir::fresh_var_id;
use std::fmt;
use std::rc::Rc;

/// A scalar data type: signed/unsigned integer of a given bit width, float
/// of a given bit width, or boolean. Mirrors the handful of dtypes a
/// loop-nest scheduler actually needs to reason about (index widths,
/// mostly) rather than a full numeric tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int(u8),
    UInt(u8),
    Float(u8),
    Bool,
}

impl DataType {
    pub const I32: DataType = DataType::Int(32);
    pub const I64: DataType = DataType::Int(64);

    /// Bit width used for index-width normalization in Tensorize (§4.8
    /// Step B). Booleans and floats don't participate in that scan.
    pub fn bits(&self) -> u8 {
        match self {
            DataType::Int(b) | DataType::UInt(b) | DataType::Float(b) => *b,
            DataType::Bool => 1,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, DataType::Int(_) | DataType::UInt(_))
    }

    pub fn with_bits(&self, bits: u8) -> DataType {
        match self {
            DataType::Int(_) => DataType::Int(bits),
            DataType::UInt(_) => DataType::UInt(bits),
            DataType::Float(_) => DataType::Float(bits),
            DataType::Bool => DataType::Bool,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Int(b) => write!(f, "int{}", b),
            DataType::UInt(b) => write!(f, "uint{}", b),
            DataType::Float(b) => write!(f, "float{}", b),
            DataType::Bool => write!(f, "bool"),
        }
    }
}

/// A variable with identity distinct from its name: two `Var`s with the
/// same name hint and dtype are still distinct variables unless they share
/// an `id`. This is what lets `Substitute` key its replacement map on
/// `Var` rather than string names.
#[derive(Clone, Debug)]
pub struct Var {
    id: u64,
    pub name_hint: String,
    pub dtype: DataType,
}

impl Var {
    pub fn new(name_hint: impl Into<String>, dtype: DataType) -> Var {
        Var {
            id: fresh_var_id(),
            name_hint: name_hint.into(),
            dtype,
        }
    }

    /// A fresh variable that copies `self`'s dtype and appends `suffix` to
    /// the name hint, e.g. cloning `i` into an inner iterator `i_i`. Per
    /// invariant 2 of the data model, inner vars get `_i` and outer vars
    /// get `_o`.
    pub fn with_suffix(&self, suffix: &str) -> Var {
        Var::new(format!("{}{}", self.name_hint, suffix), self.dtype)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Pure expressions: arithmetic terms over integer/float scalars,
/// variables, and buffer loads.
#[derive(Clone, Debug)]
pub enum Expr {
    IntImm(i64, DataType),
    FloatImm(f64, DataType),
    BoolImm(bool),
    Var(Var),
    Add(Rc<Expr>, Rc<Expr>),
    Sub(Rc<Expr>, Rc<Expr>),
    Mul(Rc<Expr>, Rc<Expr>),
    FloorDiv(Rc<Expr>, Rc<Expr>),
    FloorMod(Rc<Expr>, Rc<Expr>),
    Min(Rc<Expr>, Rc<Expr>),
    Max(Rc<Expr>, Rc<Expr>),
    Cmp(CmpOp, Rc<Expr>, Rc<Expr>),
    And(Rc<Expr>, Rc<Expr>),
    Or(Rc<Expr>, Rc<Expr>),
    Not(Rc<Expr>),
    Select(Rc<Expr>, Rc<Expr>, Rc<Expr>),
    /// A read from `buffer` at the given per-dimension index expressions.
    BufferLoad(crate::ir::Buffer, Vec<Rc<Expr>>),
    Cast(DataType, Rc<Expr>),
}

impl Expr {
    pub fn int(v: i64) -> Expr {
        Expr::IntImm(v, DataType::I32)
    }

    pub fn var(v: Var) -> Expr {
        Expr::Var(v)
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::Add(Rc::new(a), Rc::new(b))
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::Sub(Rc::new(a), Rc::new(b))
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::Mul(Rc::new(a), Rc::new(b))
    }

    pub fn floordiv(a: Expr, b: Expr) -> Expr {
        Expr::FloorDiv(Rc::new(a), Rc::new(b))
    }

    pub fn floormod(a: Expr, b: Expr) -> Expr {
        Expr::FloorMod(Rc::new(a), Rc::new(b))
    }

    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::Cmp(CmpOp::Eq, Rc::new(a), Rc::new(b))
    }

    pub fn cast(dtype: DataType, e: Expr) -> Expr {
        Expr::Cast(dtype, Rc::new(e))
    }

    pub fn const_true() -> Expr {
        Expr::BoolImm(true)
    }

    /// Whether this expression is the literal predicate `1` referenced by
    /// the trivial-fallback condition in §4.3 Step C.
    pub fn is_const_true(&self) -> bool {
        matches!(self, Expr::BoolImm(true)) || matches!(self, Expr::IntImm(1, _))
    }

    pub fn as_int_const(&self) -> Option<i64> {
        match self {
            Expr::IntImm(v, _) => Some(*v),
            _ => None,
        }
    }

    /// The set of `Var`s (by identity) that occur free in this expression.
    pub fn free_vars(&self, out: &mut Vec<Var>) {
        match self {
            Expr::IntImm(..) | Expr::FloatImm(..) | Expr::BoolImm(_) => {}
            Expr::Var(v) => {
                if !out.iter().any(|o| o == v) {
                    out.push(v.clone());
                }
            }
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::FloorDiv(a, b)
            | Expr::FloorMod(a, b)
            | Expr::Min(a, b)
            | Expr::Max(a, b)
            | Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Cmp(_, a, b) => {
                a.free_vars(out);
                b.free_vars(out);
            }
            Expr::Not(a) | Expr::Cast(_, a) => a.free_vars(out),
            Expr::Select(c, t, e) => {
                c.free_vars(out);
                t.free_vars(out);
                e.free_vars(out);
            }
            Expr::BufferLoad(_, indices) => {
                for idx in indices {
                    idx.free_vars(out);
                }
            }
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Expr::IntImm(_, dt) => *dt,
            Expr::FloatImm(_, dt) => *dt,
            Expr::BoolImm(_) => DataType::Bool,
            Expr::Var(v) => v.dtype,
            Expr::Add(a, _)
            | Expr::Sub(a, _)
            | Expr::Mul(a, _)
            | Expr::FloorDiv(a, _)
            | Expr::FloorMod(a, _)
            | Expr::Min(a, _)
            | Expr::Max(a, _) => a.dtype(),
            Expr::Cmp(..) | Expr::And(..) | Expr::Or(..) | Expr::Not(_) => DataType::Bool,
            Expr::Select(_, t, _) => t.dtype(),
            Expr::BufferLoad(buf, _) => buf.dtype,
            Expr::Cast(dt, _) => *dt,
        }
    }
}
