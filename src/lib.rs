//! The `autoclick` composition root: CLI parsing and subcommand dispatch.

pub mod cli;
pub mod run;
pub mod worker_locator;
