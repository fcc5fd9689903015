//! AppLifecycle (C10): a process-wide ordered cleanup registry, driven by
//! Ctrl-C / SIGTERM (or the Windows console-control equivalents) and
//! bounded by a global shutdown timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

type Cleanup = Box<dyn FnOnce() + Send>;

pub struct AppLifecycle {
    cleanups: Mutex<Vec<(String, Option<Cleanup>)>>,
    shutdown_timeout: Duration,
    shutting_down: AtomicBool,
}

impl AppLifecycle {
    pub fn new(shutdown_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cleanups: Mutex::new(Vec::new()),
            shutdown_timeout,
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Convenience constructor using the default 10s `shutdown_timeout`.
    pub fn with_default_timeout() -> Arc<Self> {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Registers a named cleanup callback, run in registration order during
    /// `shutdown()`.
    pub fn register_cleanup(&self, name: impl Into<String>, callback: impl FnOnce() + Send + 'static) {
        self.cleanups.lock().push((name.into(), Some(Box::new(callback))));
    }

    /// Spawns a background task that waits for a shutdown signal (Ctrl-C,
    /// SIGTERM on Unix, the console-control events on Windows) and then
    /// runs `shutdown(false)` off the async runtime via `spawn_blocking`,
    /// since `shutdown` blocks the calling thread for up to
    /// `shutdown_timeout`.
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            log::info!("shutdown signal received");
            let this = Arc::clone(&this);
            let _ = tokio::task::spawn_blocking(move || this.shutdown(false)).await;
        });
    }

    /// Runs every registered cleanup in order, in a dedicated thread, and
    /// waits up to `shutdown_timeout` for it to finish. A second call while
    /// a shutdown is already underway is ignored unless `force` is set.
    /// On timeout, force-exits the process with code 1 rather than return,
    /// since a cleanup that cannot be trusted to finish cannot be trusted
    /// to leave the process in a state safe to keep running.
    pub fn shutdown(&self, force: bool) {
        if !force && self.shutting_down.swap(true, Ordering::SeqCst) {
            log::warn!("shutdown already in progress, ignoring re-entrant request");
            return;
        }
        self.shutting_down.store(true, Ordering::SeqCst);

        let callbacks: Vec<(String, Cleanup)> = self
            .cleanups
            .lock()
            .iter_mut()
            .filter_map(|(name, cb)| cb.take().map(|cb| (name.clone(), cb)))
            .collect();

        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            for (name, callback) in callbacks {
                log::info!("running cleanup: {name}");
                callback();
            }
            let _ = done_tx.send(());
        });

        match done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) => {
                let _ = handle.join();
                log::info!("shutdown completed within budget");
            }
            Err(_) => {
                log::error!(
                    "shutdown did not complete within {:?}, forcing exit",
                    self.shutdown_timeout
                );
                std::process::exit(1);
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(windows)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::windows::{ctrl_close, ctrl_shutdown};
    let mut close_stream = ctrl_close().expect("failed to install ctrl-close handler");
    let mut shutdown_stream = ctrl_shutdown().expect("failed to install ctrl-shutdown handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = close_stream.recv() => {}
        _ = shutdown_stream.recv() => {}
    }
}

#[cfg(not(any(unix, windows)))]
async fn wait_for_shutdown_signal() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn cleanups_run_in_registration_order() {
        let lifecycle = AppLifecycle::new(Duration::from_secs(2));
        let order = Arc::new(StdMutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            lifecycle.register_cleanup(name, move || order.lock().unwrap().push(name.to_string()));
        }

        lifecycle.shutdown(false);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn a_second_shutdown_request_is_ignored_unless_forced() {
        let lifecycle = AppLifecycle::new(Duration::from_secs(2));
        let calls = Arc::new(StdMutex::new(0));

        let calls_clone = Arc::clone(&calls);
        lifecycle.register_cleanup("counter", move || *calls_clone.lock().unwrap() += 1);

        lifecycle.shutdown(false);
        assert!(lifecycle.is_shutting_down());
        // The callback was already drained by the first call; a second
        // non-forced call must not run it again (there is nothing left to
        // run, and the re-entrancy guard should short-circuit anyway).
        lifecycle.shutdown(false);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn shutdown_with_no_registered_cleanups_returns_promptly() {
        let lifecycle = AppLifecycle::new(Duration::from_millis(200));
        lifecycle.shutdown(false);
        assert!(lifecycle.is_shutting_down());
    }
}
