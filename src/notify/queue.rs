use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{NotificationIntent, Notifier};
use crate::error::PulseError;

/// Hands intents to a background task so a poll cycle never waits on the
/// notification system.
///
/// `deliver` only fails once the queue has been shut down; failures of the
/// wrapped notifier are logged by the task.
pub struct QueuedNotifier {
    tx: Mutex<Option<mpsc::UnboundedSender<NotificationIntent>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<usize>>>,
}

impl QueuedNotifier {
    /// Must be called inside a tokio runtime.
    pub fn spawn(inner: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationIntent>();

        let worker = tokio::spawn(async move {
            let mut delivered = 0;
            while let Some(intent) = rx.recv().await {
                match inner.deliver(&intent).await {
                    Ok(()) => {
                        delivered += 1;
                        debug!("Delivered notification {}", intent.id);
                    }
                    Err(e) => error!("Failed to deliver notification {}: {}", intent.id, e),
                }
            }
            delivered
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting intents, wait for the queue to drain and return how
    /// many were delivered successfully.
    pub async fn shutdown(&self) -> usize {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }

        let worker = self.worker.lock().await.take();
        match worker {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                error!("Notification worker failed: {}", e);
                0
            }),
            None => 0,
        }
    }
}

#[async_trait]
impl Notifier for QueuedNotifier {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| PulseError::delivery(&intent.id, "delivery queue lock poisoned"))?
            .clone();

        match tx {
            Some(tx) => tx
                .send(intent.clone())
                .map_err(|_| PulseError::delivery(&intent.id, "delivery queue closed")),
            None => Err(PulseError::delivery(&intent.id, "delivery queue closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CollectingNotifier {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for CollectingNotifier {
        async fn deliver(&self, intent: &NotificationIntent) -> Result<(), PulseError> {
            if intent.id.starts_with("bad") {
                return Err(PulseError::delivery(&intent.id, "rejected"));
            }
            self.seen.lock().unwrap().push(intent.id.clone());
            Ok(())
        }
    }

    fn intent(id: &str) -> NotificationIntent {
        NotificationIntent {
            id: id.to_string(),
            title: "repo #2".to_string(),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_in_order() {
        let inner = Arc::new(CollectingNotifier {
            seen: Mutex::new(Vec::new()),
        });
        let queue = QueuedNotifier::spawn(inner.clone());

        queue.deliver(&intent("a")).await.unwrap();
        queue.deliver(&intent("bad-1")).await.unwrap();
        queue.deliver(&intent("b")).await.unwrap();

        assert_eq!(queue.shutdown().await, 2);
        assert_eq!(*inner.seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_deliver_after_shutdown_fails() {
        let inner = Arc::new(CollectingNotifier {
            seen: Mutex::new(Vec::new()),
        });
        let queue = QueuedNotifier::spawn(inner);
        queue.shutdown().await;

        let err = queue.deliver(&intent("late")).await.unwrap_err();
        assert!(matches!(err, PulseError::DeliveryError(_)));
    }
}
