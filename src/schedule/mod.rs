pub mod block_info;
pub mod sref;
pub mod state;

pub use block_info::BlockScopeInfo;
pub use sref::StmtSRef;
pub use state::ScheduleState;
