//! `ScheduleError` (SPEC_FULL §4.9): the schedule layer's structured error
//! type, convertible to `color_eyre::eyre::Report` at the crate boundary.

use crate::ir::IrModule;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Raised when §4.3's subspace divider returns empty: neither the
    /// plugged `IterMapSolver` nor the trivial fallback could factor the
    /// inner block's bindings.
    #[error("The bindings of the inner block can not be blockized.")]
    SubspaceNotDivisible {
        module: IrModule,
        loop_name: String,
        block_name: String,
    },

    /// Raised by the Tensorize structural comparator (§4.8 Step C) when
    /// the target region doesn't match the intrinsic descriptor's body.
    #[error("structural match against the tensor intrinsic failed: {reason}")]
    StructuralMatchFailure { reason: String },

    /// Programmer-error contract violations: non-sibling target blocks,
    /// non-consecutive runs, reduction in outer group-blockize iterators,
    /// wrong sref kind, empty index-width scan. Not meant to be recovered
    /// from the way `SubspaceNotDivisible` can be.
    #[error("{0}")]
    ContractViolation(String),
}

impl ScheduleError {
    /// The long diagnostic template referenced at §6: "… bindings of the
    /// inner block {0} can not be blockized by the loops starting at {1}."
    pub fn long_message(&self) -> String {
        match self {
            ScheduleError::SubspaceNotDivisible {
                block_name,
                loop_name,
                ..
            } => format!(
                "bindings of the inner block {} can not be blockized by the loops starting at {}.",
                block_name, loop_name
            ),
            ScheduleError::StructuralMatchFailure { reason } => reason.clone(),
            ScheduleError::ContractViolation(msg) => msg.clone(),
        }
    }
}
