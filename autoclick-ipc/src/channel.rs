//! Bounded channel helpers implementing the "never block the sender" policy
//! required of all four IPC channels: excess messages are dropped on the
//! sending side with a local warning rather than applying backpressure to
//! the producer.

use tokio::sync::mpsc;

/// Default bounded capacity for command/status/hit/log channels, within the
/// accepted range.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A sender that never blocks: `send` is `try_send` under the hood, and a
/// full channel drops the message and logs a warning naming `channel_name`.
#[derive(Clone)]
pub struct DropOnFullSender<T> {
    inner: mpsc::Sender<T>,
    channel_name: &'static str,
}

impl<T> DropOnFullSender<T> {
    pub fn new(inner: mpsc::Sender<T>, channel_name: &'static str) -> Self {
        Self {
            inner,
            channel_name,
        }
    }

    /// Attempts to enqueue `value`. Returns `true` if it was enqueued.
    /// A full queue or a closed receiver are both logged and swallowed,
    /// since no caller in this system should block on IPC backpressure.
    pub fn send(&self, value: T) -> bool {
        match self.inner.try_send(value) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("{}: channel full, dropping message", self.channel_name);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!(
                    "{}: receiver dropped, discarding message",
                    self.channel_name
                );
                false
            }
        }
    }
}

/// Builds a bounded channel pair wrapped with the drop-on-full sender
/// policy, at the crate's default capacity.
pub fn bounded<T>(channel_name: &'static str) -> (DropOnFullSender<T>, mpsc::Receiver<T>) {
    bounded_with_capacity(channel_name, DEFAULT_CHANNEL_CAPACITY)
}

pub fn bounded_with_capacity<T>(
    channel_name: &'static str,
    capacity: usize,
) -> (DropOnFullSender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (DropOnFullSender::new(tx, channel_name), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_succeeds_while_capacity_remains() {
        let (tx, mut rx) = bounded_with_capacity::<u32>("test", 2);
        assert!(tx.send(1));
        assert!(tx.send(2));
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test]
    async fn send_drops_silently_without_blocking_when_full() {
        let (tx, mut rx) = bounded_with_capacity::<u32>("test", 1);
        assert!(tx.send(1));
        assert!(!tx.send(2));
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test]
    async fn send_reports_false_once_receiver_is_gone() {
        let (tx, rx) = bounded_with_capacity::<u32>("test", 1);
        drop(rx);
        assert!(!tx.send(1));
    }
}
