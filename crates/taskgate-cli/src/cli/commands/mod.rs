//! CLI command handlers, one per file.

mod batch;
mod config;
mod simulate;

pub use batch::run_batch;
pub use config::run_config;
pub use simulate::{run_simulate, SimulateArgs};
