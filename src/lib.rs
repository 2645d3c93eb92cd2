pub mod cli;
pub mod config;
pub mod simulate;
pub mod trace;

pub use crate::cli::Args;
pub use crate::config::Config;
pub use crate::simulate::Simulator;
pub use crate::trace::{TraceEntry, TraceSource};
