use crate::ir::{Buffer, Stmt, Var};
use std::collections::HashMap;

/// A named function: an ordered parameter list, a parameter→buffer map,
/// and a body (conventionally a single top-level `BlockRealize`).
#[derive(Clone, Debug)]
pub struct PrimFunc {
    pub name: String,
    pub params: Vec<Var>,
    pub buffer_map: HashMap<u64, Buffer>,
    pub body: Stmt,
}

impl PrimFunc {
    pub fn new(name: impl Into<String>, params: Vec<Var>, body: Stmt) -> PrimFunc {
        PrimFunc {
            name: name.into(),
            params,
            buffer_map: HashMap::new(),
            body,
        }
    }

    pub fn bind_buffer(&mut self, param: &Var, buffer: Buffer) {
        self.buffer_map.insert(param.id(), buffer);
    }

    /// The ordered list of buffers bound to this function's parameters,
    /// in parameter order, skipping any parameter with no bound buffer.
    /// Used to build the `impl -> desc` / `impl -> current` buffer maps
    /// in Tensorize (§4.8 Step D).
    pub fn ordered_buffers(&self) -> Vec<Buffer> {
        self.params
            .iter()
            .filter_map(|p| self.buffer_map.get(&p.id()).cloned())
            .collect()
    }
}

/// A named collection of `PrimFunc`s: the "enclosing IR module" of §3,
/// used as `ScheduleState::module` and as location-of-interest payload on
/// `ScheduleError`.
#[derive(Clone, Debug)]
pub struct IrModule {
    pub name: String,
    pub funcs: HashMap<String, PrimFunc>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> IrModule {
        IrModule {
            name: name.into(),
            funcs: HashMap::new(),
        }
    }

    pub fn with_func(mut self, func: PrimFunc) -> IrModule {
        self.funcs.insert(func.name.clone(), func);
        self
    }
}
