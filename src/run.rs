//! Composition root: wires configuration, the target finder, the scanner
//! process manager, and lifecycle shutdown together for each CLI subcommand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use autoclick_config::ConfigDoc;
use autoclick_finder::{FinderQuery, PollingConfig as FinderPollingConfig, RecoveryConfig, SmartTargetFinder};
use autoclick_lifecycle::AppLifecycle;
use autoclick_process::ScannerProcessManager;

use crate::worker_locator::worker_binary_path;

const MANAGER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn load_config(path: Option<PathBuf>) -> Result<ConfigDoc> {
    match path {
        Some(path) => ConfigDoc::load_from(&path).context("failed to load config file"),
        None => ConfigDoc::load_or_create_default().context("failed to load or create default config"),
    }
}

fn finder_query(doc: &ConfigDoc) -> FinderQuery {
    FinderQuery {
        process_basename: doc.target_process.clone(),
        process_path_fragment: None,
        window_title_fragment: doc.target_window_title.clone(),
        window_class_fragment: None,
        fuzzy_title_tokens: doc
            .target_window_title
            .as_deref()
            .map(autoclick_finder::tokenize_title)
            .unwrap_or_default(),
        enabled: doc.finder_strategies.clone(),
    }
}

fn finder_polling_config(doc: &ConfigDoc) -> FinderPollingConfig {
    FinderPollingConfig {
        base_interval_ms: doc.smart_finder_base_interval_ms,
        min_interval_ms: doc.smart_finder_min_interval_ms,
        max_interval_ms: doc.smart_finder_max_interval_ms,
    }
}

fn recovery_config(doc: &ConfigDoc) -> RecoveryConfig {
    RecoveryConfig {
        enabled: doc.enable_auto_recovery,
        max_attempts: doc.max_recovery_attempts,
        cooldown: Duration::from_millis(doc.recovery_cooldown_ms),
    }
}

/// Loads config, starts the scanner subprocess and the target finder, and
/// blocks until a shutdown signal arrives or the scanner subprocess exits on
/// its own.
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let doc = load_config(config_path)?;
    doc.validate().context("config failed validation")?;
    let scanner_config = doc.to_scanner_config().context("failed to build scanner config")?;

    let app_root = std::env::current_dir().unwrap_or_default();
    let worker_binary = worker_binary_path()?;
    log::info!("resolved scanner-worker binary at {:?}", worker_binary);

    let lifecycle = AppLifecycle::with_default_timeout();
    lifecycle.install_signal_handlers();

    let manager = Arc::new(Mutex::new(ScannerProcessManager::new(worker_binary, app_root)));
    manager.lock().await.start(scanner_config).await.context("scanner-worker failed to start")?;

    let cleanup_manager = Arc::clone(&manager);
    let rt_handle = tokio::runtime::Handle::current();
    lifecycle.register_cleanup("scanner-process-manager", move || {
        rt_handle.block_on(async {
            let mut guard = cleanup_manager.lock().await;
            let _ = guard.shutdown(MANAGER_SHUTDOWN_TIMEOUT).await;
        });
    });

    let mut finder = SmartTargetFinder::new(finder_query(&doc), finder_polling_config(&doc), recovery_config(&doc));
    finder.start_event_hook().context("failed to install the window event hook")?;

    log::info!("autoclick is running, press Ctrl-C to stop");

    loop {
        if lifecycle.is_shutting_down() {
            break;
        }

        let now = Instant::now();
        if finder.poll_due(now) {
            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Err(e) = finder.search_once(now, now_ms) {
                log::warn!("target search failed: {e}");
            }
        }
        for hwnd in finder.drain_hook_events() {
            log::debug!("event hook proposed target switch to hwnd={hwnd}");
        }

        let outcome = {
            let mut guard = manager.lock().await;
            guard.poll_once().await
        };
        if let Some(status) = &outcome.status {
            log::info!("scanner status: {} ({})", status.phase_text, status.detail);
            if let Some(err) = &status.error_message {
                log::error!("scanner reported error: {err}");
            }
        }
        for hit in &outcome.hits {
            log::info!("match hit: score={:.3} at ({}, {})", hit.score, hit.x, hit.y);
        }
        for line in &outcome.logs {
            log::info!("[scanner-worker] {}", line.text);
        }
        if outcome.child_exited {
            log::warn!("scanner-worker process exited, stopping");
            break;
        }

        let sleep_for = manager.lock().await.next_poll_interval();
        tokio::time::sleep(sleep_for).await;
    }

    finder.stop_event_hook();
    manager.lock().await.shutdown(MANAGER_SHUTDOWN_TIMEOUT).await.ok();
    Ok(())
}

pub fn list_windows() -> Result<()> {
    let windows = autoclick_capture::win32::enumerate_windows().context("failed to enumerate windows")?;
    for w in windows.iter().filter(|w| w.visible) {
        println!(
            "hwnd={} class={:<24} process={:<24} title={}",
            w.hwnd, w.class_name, w.process_name, w.title
        );
    }
    Ok(())
}

pub fn list_monitors() -> Result<()> {
    for monitor in autoclick_capture::list_monitors() {
        println!(
            "monitor[{}]: ({}, {}) - ({}, {})",
            monitor.index, monitor.left, monitor.top, monitor.right, monitor.bottom
        );
    }
    Ok(())
}

pub fn validate_config(config_path: Option<PathBuf>) -> Result<()> {
    let doc = load_config(config_path)?;
    match doc.validate() {
        Ok(()) => {
            println!("config is valid");
            Ok(())
        }
        Err(e) => {
            println!("config is invalid: {e}");
            Err(e.into())
        }
    }
}
