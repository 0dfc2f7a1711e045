//! A minimal stand-in for the Python-facing trace/replay façade (§6):
//! records each primitive invocation as an `Instruction` in a process-wide
//! log, mirroring the teacher's global-registry idiom but scoped to this
//! crate's two instruction kinds.

use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    /// 1 input (a loop or a list of blocks), 1 attribute
    /// (`preserve_unit_iters`), 0 decisions, impure, returns one block.
    Blockize,
    /// 1 input (a block or loop), 2 attributes (`intrin`,
    /// `preserve_unit_iters`), 0 decisions, impure, returns nothing.
    Tensorize,
}

#[derive(Clone, Debug)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub inputs: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub outputs: Vec<String>,
}

lazy_static! {
    static ref TRACE_LOG: Mutex<Vec<Instruction>> = Mutex::new(Vec::new());
}

pub fn record(instr: Instruction) {
    TRACE_LOG.lock().expect("trace log mutex poisoned").push(instr);
}

/// A snapshot of every instruction recorded so far in this process.
pub fn snapshot() -> Vec<Instruction> {
    TRACE_LOG.lock().expect("trace log mutex poisoned").clone()
}

pub fn record_blockize(inputs: Vec<String>, preserve_unit_iters: bool, output: String) {
    record(Instruction {
        kind: InstructionKind::Blockize,
        inputs,
        attrs: vec![("preserve_unit_iters".into(), preserve_unit_iters.to_string())],
        outputs: vec![output],
    });
}

pub fn record_tensorize(input: String, intrin: &str, preserve_unit_iters: bool) {
    record(Instruction {
        kind: InstructionKind::Tensorize,
        inputs: vec![input],
        attrs: vec![
            ("intrin".into(), intrin.to_string()),
            ("preserve_unit_iters".into(), preserve_unit_iters.to_string()),
        ],
        outputs: vec![],
    });
}
