//! ScannerProcessManager (C8): spawns the `autoclick-scanner-worker`
//! subprocess, owns its IPC channel ends, and supervises it through
//! startup handshake, adaptive polling, and graceful shutdown.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, ChildStdin, Command};

use autoclick_ipc::wire::write_envelope;
use autoclick_ipc::{Envelope, LogLine, MatchHit, ScannerCommand, ScannerConfig, ScannerStatus};

use crate::channels::spawn_reader;
use crate::error::{ProcessError, Result};
use crate::polling::{AdaptivePollTimer, PollingConfig};
use crate::watchdog::WatchdogConfig;

/// What a single `poll_once` call drained from the child. `status` holds
/// only the latest snapshot (earlier ones in the same tick are merged
/// away), matching the "keep only the latest" per-tick budget rule.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub status: Option<ScannerStatus>,
    pub hits: Vec<MatchHit>,
    pub logs: Vec<LogLine>,
    pub child_exited: bool,
}

const POLL_BUDGET: Duration = Duration::from_millis(8);
const MAX_STATUS_PER_TICK: usize = 5;
const MAX_HITS_PER_TICK: usize = 10;
const MAX_LOGS_PER_TICK: usize = 20;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1200);
const SHUTDOWN_KILL_WAIT: Duration = Duration::from_millis(500);

pub struct ScannerProcessManager {
    worker_binary: PathBuf,
    app_root: PathBuf,
    watchdog_config: WatchdogConfig,
    poll_timer: AdaptivePollTimer,
    token_counter: Arc<AtomicU64>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
    status_rx: Option<tokio::sync::mpsc::Receiver<ScannerStatus>>,
    hit_rx: Option<tokio::sync::mpsc::Receiver<MatchHit>>,
    log_rx: Option<tokio::sync::mpsc::Receiver<LogLine>>,
    running: bool,
}

impl ScannerProcessManager {
    pub fn new(worker_binary: PathBuf, app_root: PathBuf) -> Self {
        Self::with_config(
            worker_binary,
            app_root,
            WatchdogConfig::default(),
            PollingConfig::default(),
        )
    }

    pub fn with_config(
        worker_binary: PathBuf,
        app_root: PathBuf,
        watchdog_config: WatchdogConfig,
        poll_config: PollingConfig,
    ) -> Self {
        Self {
            worker_binary,
            app_root,
            watchdog_config,
            poll_timer: AdaptivePollTimer::new(poll_config),
            token_counter: Arc::new(AtomicU64::new(0)),
            child: None,
            stdin: None,
            reader_task: None,
            status_rx: None,
            hit_rx: None,
            log_rx: None,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session_token(&self) -> u64 {
        self.token_counter.load(Ordering::SeqCst)
    }

    /// Spawns the subprocess and sends `Start`, retrying the startup
    /// handshake on watchdog expiry up to `max_attempts` times. If a
    /// previous session's `running` flag was left set (its child process
    /// died without us observing it), force a cleanup pass first rather
    /// than refusing to start or leaking the old channels.
    pub async fn start(&mut self, config: ScannerConfig) -> Result<()> {
        if self.running || self.child.is_some() {
            log::warn!("start() called with a stale running session; forcing cleanup first");
            self.force_cleanup().await;
        }
        self.token_counter.fetch_add(1, Ordering::SeqCst);
        let token = self.session_token();

        let mut attempt = 1;
        loop {
            self.spawn_child()?;
            self.send_command(ScannerCommand::Start { config: config.clone() }).await?;

            let timeout = self.watchdog_config.timeout_for_attempt(attempt);
            match self.wait_for_ready(timeout, token).await {
                Ok(()) => {
                    self.running = true;
                    return Ok(());
                }
                Err(_) => {
                    self.force_cleanup().await;
                    if attempt >= self.watchdog_config.max_attempts {
                        return Err(ProcessError::StartupTimedOut { attempts: attempt });
                    }
                    attempt += 1;
                    self.token_counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    pub async fn update_config(&mut self, config: ScannerConfig) -> Result<()> {
        if !self.running {
            return Err(ProcessError::NotRunning);
        }
        self.send_command(ScannerCommand::UpdateConfig { config }).await
    }

    /// Graceful shutdown ladder: `Stop` -> grace period -> `Exit` -> wait
    /// remaining budget -> terminate -> hard-kill.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        if !self.running && self.child.is_none() {
            return Ok(());
        }
        let deadline = Instant::now() + timeout;

        let _ = self.send_command(ScannerCommand::Stop).await;
        tokio::time::sleep(SHUTDOWN_GRACE.min(timeout)).await;
        let _ = self.send_command(ScannerCommand::Exit).await;

        if let Some(child) = self.child.as_mut() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let exited = tokio::time::timeout(remaining, child.wait()).await;
            if exited.is_err() {
                log::warn!("scanner-worker did not exit within its shutdown budget, killing it");
                let _ = child.start_kill();
                let _ = tokio::time::timeout(SHUTDOWN_KILL_WAIT, child.wait()).await;
            }
        }
        self.force_cleanup().await;
        Ok(())
    }

    pub fn next_poll_interval(&self) -> Duration {
        self.poll_timer.current_interval()
    }

    /// Drains the three receive channels within a short wall-clock budget
    /// and per-channel caps, then feeds the activity/idle observation back
    /// into the adaptive poll timer.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let start = Instant::now();
        let mut outcome = PollOutcome::default();

        if let Some(rx) = self.status_rx.as_mut() {
            let mut count = 0;
            while count < MAX_STATUS_PER_TICK && start.elapsed() < POLL_BUDGET {
                match rx.try_recv() {
                    Ok(status) => {
                        outcome.status = Some(status);
                        count += 1;
                    }
                    Err(_) => break,
                }
            }
        }
        if let Some(rx) = self.hit_rx.as_mut() {
            while outcome.hits.len() < MAX_HITS_PER_TICK && start.elapsed() < POLL_BUDGET {
                match rx.try_recv() {
                    Ok(hit) => outcome.hits.push(hit),
                    Err(_) => break,
                }
            }
        }
        if let Some(rx) = self.log_rx.as_mut() {
            while outcome.logs.len() < MAX_LOGS_PER_TICK && start.elapsed() < POLL_BUDGET {
                match rx.try_recv() {
                    Ok(log) => outcome.logs.push(log),
                    Err(_) => break,
                }
            }
        }

        let had_activity = outcome.status.is_some() || !outcome.hits.is_empty() || !outcome.logs.is_empty();
        if had_activity {
            self.poll_timer.record_activity();
        } else {
            self.poll_timer.record_empty(Instant::now());
        }

        if let Some(child) = self.child.as_mut()
            && let Ok(Some(_exit_status)) = child.try_wait()
        {
            outcome.child_exited = true;
            self.running = false;
        }

        outcome
    }

    fn spawn_child(&mut self) -> Result<()> {
        let mut command = Command::new(&self.worker_binary);
        command
            .arg(&self.app_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command.spawn().map_err(ProcessError::Spawn)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let channels = spawn_reader(stdout);
        self.status_rx = Some(channels.status_rx);
        self.hit_rx = Some(channels.hit_rx);
        self.log_rx = Some(channels.log_rx);
        self.reader_task = Some(channels.reader_task);
        self.stdin = Some(stdin);
        self.child = Some(child);
        Ok(())
    }

    async fn send_command(&mut self, command: ScannerCommand) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(ProcessError::NotRunning)?;
        write_envelope(stdin, &Envelope::Command(command))
            .await
            .map_err(ProcessError::from)
    }

    /// Waits for the first `running: true` status, bailing early if the
    /// session token has since advanced (a concurrent `start()` retry
    /// superseded this attempt).
    async fn wait_for_ready(&mut self, timeout: Duration, token: u64) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.session_token() != token {
                return Err(ProcessError::StartupTimedOut { attempts: 0 });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProcessError::StartupTimedOut { attempts: 1 });
            }
            let Some(rx) = self.status_rx.as_mut() else {
                return Err(ProcessError::NotRunning);
            };
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(status)) if status.running => return Ok(()),
                Ok(Some(_)) => continue,
                Ok(None) => return Err(ProcessError::NotRunning),
                Err(_) => return Err(ProcessError::StartupTimedOut { attempts: 1 }),
            }
        }
    }

    /// Tears down everything the manager owns for the current session:
    /// closes the channel ends in a fixed order (stdin first so the child
    /// observes EOF, then the receive channels), aborts the reader task,
    /// and kills the child if it is still alive. Safe to call when nothing
    /// is running.
    async fn force_cleanup(&mut self) {
        self.stdin = None;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.status_rx = None;
        self.hit_rx = None;
        self.log_rx = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_config_fails_without_a_running_session() {
        let mut manager = ScannerProcessManager::new(PathBuf::from("does-not-exist"), PathBuf::from("."));
        let err = manager
            .update_config(sample_config())
            .await
            .expect_err("no session is running");
        assert!(matches!(err, ProcessError::NotRunning));
    }

    #[tokio::test]
    async fn shutdown_is_a_no_op_when_nothing_is_running() {
        let mut manager = ScannerProcessManager::new(PathBuf::from("does-not-exist"), PathBuf::from("."));
        manager.shutdown(Duration::from_millis(50)).await.unwrap();
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn start_fails_cleanly_when_the_worker_binary_does_not_exist() {
        let mut manager = ScannerProcessManager::new(PathBuf::from("/nonexistent/autoclick-scanner-worker"), PathBuf::from("."));
        let err = manager.start(sample_config()).await.expect_err("spawn must fail");
        assert!(matches!(err, ProcessError::Spawn(_)));
    }

    fn sample_config() -> ScannerConfig {
        ScannerConfig {
            target_spec: autoclick_ipc::TargetSpec::Monitor { index: 0 },
            template_refs: vec!["templates/a.png".into()],
            roi: None,
            threshold: 0.85,
            grayscale: false,
            interval_ms: 100,
            fps_max: 30,
            include_cursor: false,
            border_required: false,
            restore_minimized: false,
            click_offset: autoclick_ipc::ClickOffset::default(),
            click_delay_ms: 500,
            enhanced_window_finding: true,
            verify_window_before_click: true,
            send_mousemove_before_click: false,
            debug_mode: false,
        }
    }
}
