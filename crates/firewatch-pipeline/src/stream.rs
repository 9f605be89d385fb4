//! Hand-off of encoded stream parts from blocking workers to HTTP bodies.

use tokio::sync::mpsc;

/// Parts queued between a worker and its consumer. One slot, so a slow
/// client stalls the worker instead of building a backlog.
pub const PART_CHANNEL_CAPACITY: usize = 1;

/// Consumer of multipart stream parts.
pub trait PartSink: Send {
    /// Deliver one part. Returns `false` once the consumer has gone away.
    fn send_part(&mut self, part: Vec<u8>) -> bool;
}

/// [`PartSink`] over a bounded channel, for use on blocking threads.
pub struct ChannelPartSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl PartSink for ChannelPartSink {
    fn send_part(&mut self, part: Vec<u8>) -> bool {
        self.tx.blocking_send(part).is_ok()
    }
}

/// Bounded part channel.
pub fn part_channel() -> (ChannelPartSink, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(PART_CHANNEL_CAPACITY);
    (ChannelPartSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_reports_disconnect() {
        let (mut sink, mut rx) = part_channel();
        let worker = tokio::task::spawn_blocking(move || {
            let first = sink.send_part(b"a".to_vec());
            (first, sink)
        });
        assert_eq!(rx.recv().await.unwrap(), b"a".to_vec());
        let (first, mut sink) = worker.await.unwrap();
        assert!(first);

        drop(rx);
        let second = tokio::task::spawn_blocking(move || sink.send_part(b"b".to_vec()))
            .await
            .unwrap();
        assert!(!second);
    }
}
