//! Locates the `autoclick-scanner-worker` binary the process manager spawns:
//! always a sibling of the currently-running `autoclick` executable, since
//! both binaries are built and shipped together.

use std::path::PathBuf;

use anyhow::{Context, Result};

const WORKER_BINARY_NAME: &str = "autoclick-scanner-worker";

pub fn worker_binary_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to determine the running executable's path")?;
    let dir = exe
        .parent()
        .context("running executable has no parent directory")?;
    let mut candidate = dir.join(WORKER_BINARY_NAME);
    if cfg!(windows) {
        candidate.set_extension("exe");
    }
    Ok(candidate)
}
