//! Entry point for the `autoclick-scanner-worker` subprocess. Speaks the
//! newline-delimited JSON envelope protocol over stdin/stdout and drives one
//! [`autoclick_scanner::ScannerWorker`] through its command lifecycle.
//!
//! Takes the app root directory (for resolving relative template paths) as
//! its first CLI argument, falling back to the current directory. Every
//! `Start`/`UpdateConfig` command carries a full, self-contained
//! `ScannerConfig`: this process never assumes state survived from a
//! previous run, since the controller may spawn a fresh instance of this
//! binary after a crash.

use std::time::Duration;

use autoclick_config::logging;
use autoclick_ipc::wire::{read_envelope, write_envelope};
use autoclick_ipc::{Envelope, LogLine, ScannerCommand, ScannerStatus};
use autoclick_scanner::ScannerWorker;
use tokio::io::{AsyncWrite, BufReader};

#[tokio::main]
async fn main() {
    logging::init_logging(false);

    let app_root = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    let mut worker: Option<ScannerWorker> = None;

    loop {
        let tick_delay = worker
            .as_ref()
            .map(|w| w.next_tick_delay())
            .unwrap_or(Duration::from_secs(3600));

        tokio::select! {
            biased;

            envelope = read_envelope(&mut reader) => {
                match envelope {
                    Ok(Some(Envelope::Command(command))) => {
                        if !handle_command(command, &mut worker, &app_root, &mut stdout).await {
                            break;
                        }
                    }
                    Ok(Some(_other)) => {
                        // The controller never sends Status/Hit/Log envelopes down this
                        // pipe; ignore anything unexpected rather than treating it fatally.
                    }
                    Ok(None) => {
                        log::info!("controller closed stdin, shutting down");
                        break;
                    }
                    Err(e) => {
                        log::error!("failed to decode command envelope: {e}");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep(tick_delay), if worker.is_some() => {
                let Some(w) = worker.as_mut() else { continue };
                let outcome = w.tick();
                if let Some(status) = outcome.status
                    && send(&mut stdout, &Envelope::Status(status)).await.is_err()
                {
                    break;
                }
                if let Some(hit) = outcome.hit
                    && send(&mut stdout, &Envelope::Hit(hit)).await.is_err()
                {
                    break;
                }
            }
        }
    }
}

/// Returns `false` when the process should exit its main loop.
async fn handle_command<W: AsyncWrite + Unpin>(
    command: ScannerCommand,
    worker: &mut Option<ScannerWorker>,
    app_root: &std::path::Path,
    stdout: &mut W,
) -> bool {
    match command {
        ScannerCommand::Start { config } => {
            match ScannerWorker::new(config, app_root.to_path_buf()) {
                Ok(mut w) => match w.start() {
                    Ok(status) => {
                        *worker = Some(w);
                        let _ = send(stdout, &Envelope::Status(status)).await;
                    }
                    Err(e) => {
                        let _ = send(stdout, &Envelope::Status(error_status(&e.to_string()))).await;
                    }
                },
                Err(e) => {
                    let _ = send(stdout, &Envelope::Status(error_status(&e.to_string()))).await;
                }
            }
        }
        ScannerCommand::Stop => {
            if let Some(w) = worker.as_mut() {
                w.stop();
            }
            *worker = None;
            let _ = send(
                stdout,
                &Envelope::Status(ScannerStatus {
                    running: false,
                    phase_text: "stopped".into(),
                    backend_label: "windows-capture".into(),
                    detail: "stop command processed".into(),
                    scan_count: 0,
                    error_message: None,
                    timestamp_ms: now_ms(),
                }),
            )
            .await;
        }
        ScannerCommand::UpdateConfig { config } => {
            if let Some(w) = worker.as_mut()
                && let Err(e) = w.update_config(config)
            {
                let _ = send(stdout, &Envelope::Log(LogLine { text: format!("update_config rejected: {e}") })).await;
            }
        }
        ScannerCommand::Exit => {
            if let Some(w) = worker.as_mut() {
                w.stop();
            }
            return false;
        }
    }
    true
}

fn error_status(detail: &str) -> ScannerStatus {
    ScannerStatus {
        running: false,
        phase_text: "error".into(),
        backend_label: "windows-capture".into(),
        detail: detail.to_string(),
        scan_count: 0,
        error_message: Some(detail.to_string()),
        timestamp_ms: now_ms(),
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &Envelope) -> autoclick_ipc::Result<()> {
    write_envelope(writer, envelope).await
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
