//! Demuxes the scanner-worker's stdout envelope stream into the three
//! receive channels the controller polls.

use tokio::io::BufReader;
use tokio::process::ChildStdout;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use autoclick_ipc::channel::bounded;
use autoclick_ipc::wire::read_envelope;
use autoclick_ipc::{Envelope, LogLine, MatchHit, ScannerStatus};

pub struct ReceiveChannels {
    pub status_rx: mpsc::Receiver<ScannerStatus>,
    pub hit_rx: mpsc::Receiver<MatchHit>,
    pub log_rx: mpsc::Receiver<LogLine>,
    pub reader_task: JoinHandle<()>,
}

/// Spawns the task that owns the child's stdout for its entire lifetime,
/// reading one envelope per line and routing it to the matching bounded
/// channel. The task exits on a clean EOF (child closed stdout) or a
/// decode error, either of which the manager treats as "the child is
/// gone" once it notices the channels have closed.
pub fn spawn_reader(stdout: ChildStdout) -> ReceiveChannels {
    let (status_tx, status_rx) = bounded::<ScannerStatus>("status");
    let (hit_tx, hit_rx) = bounded::<MatchHit>("hit");
    let (log_tx, log_rx) = bounded::<LogLine>("log");

    let reader_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        loop {
            match read_envelope(&mut reader).await {
                Ok(Some(Envelope::Status(status))) => {
                    status_tx.send(status);
                }
                Ok(Some(Envelope::Hit(hit))) => {
                    hit_tx.send(hit);
                }
                Ok(Some(Envelope::Log(log))) => {
                    log_tx.send(log);
                }
                Ok(Some(Envelope::Command(_))) => {
                    // The child never sends a Command envelope back upstream.
                }
                Ok(None) => {
                    log::info!("scanner-worker closed stdout");
                    break;
                }
                Err(e) => {
                    log::error!("failed to decode scanner-worker envelope: {e}");
                    break;
                }
            }
        }
    });

    ReceiveChannels {
        status_rx,
        hit_rx,
        log_rx,
        reader_task,
    }
}
