//! Newline-delimited JSON wire envelope multiplexing the four logical
//! channels (command, status, hit, log) over one pipe.
//!
//! The controller spawns the scanner subprocess and speaks this protocol
//! over its stdin/stdout; each side demuxes incoming envelopes into
//! separate bounded `tokio::sync::mpsc` channels (see [`crate::channel`]).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{IpcError, Result};
use crate::types::{LogLine, ScannerCommand, ScannerStatus};
use crate::MatchHit;

/// One line of the wire protocol. Exactly one variant is ever present on a
/// given line; envelopes are multiplexed by type, not by a separate channel
/// id, since the underlying transport is a single ordered byte stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel")]
pub enum Envelope {
    Command(ScannerCommand),
    Status(ScannerStatus),
    Hit(MatchHit),
    Log(LogLine),
}

/// Serializes one envelope as a single line of JSON terminated by `\n`.
pub fn encode_line(envelope: &Envelope) -> Result<String> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

/// Parses one previously-trimmed line of JSON into an envelope.
pub fn decode_line(line: &str) -> Result<Envelope> {
    if line.trim().is_empty() {
        return Err(IpcError::Decode(
            serde_json::from_str::<Envelope>("").unwrap_err(),
        ));
    }
    Ok(serde_json::from_str(line)?)
}

/// Writes one envelope to `writer` and flushes it immediately. Each write is
/// a single line, so interleaved writers on the sending side never tear a
/// line in half as long as each caller awaits this before issuing another.
pub async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<()> {
    let line = encode_line(envelope)?;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| IpcError::ConnectionClosed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| IpcError::ConnectionClosed(e.to_string()))?;
    Ok(())
}

/// Reads one envelope from a line-buffered reader. Returns `Ok(None)` on a
/// clean EOF (the remote end closed its writer), which callers should treat
/// as "connection closed" rather than an error.
pub async fn read_envelope<R>(reader: &mut BufReader<R>) -> Result<Option<Envelope>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let bytes = reader
        .read_line(&mut line)
        .await
        .map_err(|e| IpcError::ConnectionClosed(e.to_string()))?;
    if bytes == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(decode_line(trimmed)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CaptureMode, MatchHit};

    #[tokio::test]
    async fn round_trips_an_envelope_over_a_pipe() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = client;
        let mut reader = BufReader::new(server);

        let hit = MatchHit {
            score: 0.93,
            x: 10,
            y: 10,
            template_w: 10,
            template_h: 10,
            timestamp_ms: 1234,
            capture_mode: CaptureMode::Window,
        };
        write_envelope(&mut writer, &Envelope::Hit(hit)).await.unwrap();

        let decoded = read_envelope(&mut reader).await.unwrap().unwrap();
        match decoded {
            Envelope::Hit(got) => assert_eq!(got.x, 10),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_envelope_reports_clean_eof_as_none() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = BufReader::new(server);
        let decoded = read_envelope(&mut reader).await.unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn decode_line_rejects_blank_input() {
        assert!(decode_line("   ").is_err());
    }
}
