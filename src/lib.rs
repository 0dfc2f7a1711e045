#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod diagnostics;
pub mod error;
pub mod intrinsic;
pub mod ir;
pub mod primitives;
pub mod schedule;
pub mod trace;

pub use error::ScheduleError;
pub use primitives::{blockize, blockize_group, tensorize};

extern crate color_eyre;
extern crate tracing;
extern crate tracing_subscriber;

#[macro_use]
extern crate lazy_static;
