use barrage_types::AttackResult;
use thiserror::Error;
use tokio::sync::mpsc;

/// The receiving half was dropped; no further results can be delivered.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("result channel closed")]
pub struct ChannelClosed;

/// Creates the bounded hand-off between attack loops and the aggregator.
///
/// Senders wait when `capacity` results are queued. A capacity of zero is
/// treated as one.
pub fn result_channel(capacity: usize) -> (ResultSender, ResultReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResultSender { inner: tx }, ResultReceiver { inner: rx })
}

#[derive(Debug, Clone)]
pub struct ResultSender {
    inner: mpsc::Sender<AttackResult>,
}

impl ResultSender {
    pub async fn send(&self, result: AttackResult) -> Result<(), ChannelClosed> {
        self.inner.send(result).await.map_err(|_| ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[derive(Debug)]
pub struct ResultReceiver {
    inner: mpsc::Receiver<AttackResult>,
}

impl ResultReceiver {
    /// Next result, or `None` once every sender is gone and the queue is
    /// empty.
    pub async fn recv(&mut self) -> Option<AttackResult> {
        self.inner.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(code: u16) -> AttackResult {
        AttackResult {
            target: "api".to_string(),
            endpoint: "http://localhost/".to_string(),
            test_name: "smoke".to_string(),
            status_code: code,
            latency: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let (tx, mut rx) = result_channel(0);
        tx.send(result(200)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().status_code, 200);
    }

    #[tokio::test]
    async fn receiver_drains_after_senders_drop() {
        let (tx, mut rx) = result_channel(4);
        let other = tx.clone();
        tx.send(result(200)).await.unwrap();
        other.send(result(500)).await.unwrap();
        drop(tx);
        drop(other);

        assert_eq!(rx.recv().await.unwrap().status_code, 200);
        assert_eq!(rx.recv().await.unwrap().status_code, 500);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = result_channel(1);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.send(result(200)).await, Err(ChannelClosed));
    }
}
