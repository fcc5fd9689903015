//! Shared `env_logger` initialization, reused by both the controller binary
//! and the scanner subprocess binary so their log lines are formatted
//! identically (the scanner's lines are additionally forwarded to the
//! controller over the IPC log channel; see `autoclick-scanner`).

/// Initializes `env_logger` with a floor driven by `debug_mode`: `debug`
/// when set, `info` otherwise, while still honoring `RUST_LOG` overrides
/// for finer-grained module filtering.
pub fn init_logging(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
