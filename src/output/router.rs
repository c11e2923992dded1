//! Routing of items into two bounded queues by full-text availability.

use tokio::sync::mpsc;

use crate::ingest::Item;
use crate::{PollerError, Result};

/// Default capacity of each queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

/// Sending side of the two output queues.
///
/// Cloned into every poll task. The queues close once every clone is dropped.
#[derive(Clone)]
pub struct OutputRouter {
    with_full_text: mpsc::Sender<Item>,
    without_full_text: mpsc::Sender<Item>,
}

/// Receiving side of the two output queues.
pub struct RouterReceivers {
    pub with_full_text: mpsc::Receiver<Item>,
    pub without_full_text: mpsc::Receiver<Item>,
}

impl OutputRouter {
    /// Create a router with `capacity` slots per queue.
    pub fn new(capacity: usize) -> (Self, RouterReceivers) {
        let (full_tx, full_rx) = mpsc::channel(capacity.max(1));
        let (desc_tx, desc_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                with_full_text: full_tx,
                without_full_text: desc_tx,
            },
            RouterReceivers {
                with_full_text: full_rx,
                without_full_text: desc_rx,
            },
        )
    }

    /// Push an item onto exactly one queue, waiting for capacity.
    pub async fn route(&self, item: Item) -> Result<()> {
        let queue = if item.has_full_text {
            &self.with_full_text
        } else {
            &self.without_full_text
        };
        queue
            .send(item)
            .await
            .map_err(|_| PollerError::Sink("output queue closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn item(title: &str, has_full_text: bool) -> Item {
        Item {
            title: title.into(),
            description: String::new(),
            full_text: String::new(),
            link: format!("https://a.example/{title}"),
            name: "A".into(),
            category: String::new(),
            enclosure: String::new(),
            pub_date: Utc::now(),
            fingerprint: title.into(),
            has_full_text,
            changed: false,
        }
    }

    #[tokio::test]
    async fn test_route_by_full_text() {
        let (router, mut rx) = OutputRouter::new(4);
        router.route(item("full", true)).await.unwrap();
        router.route(item("desc", false)).await.unwrap();

        assert_eq!(rx.with_full_text.recv().await.unwrap().title, "full");
        assert_eq!(rx.without_full_text.recv().await.unwrap().title, "desc");
        assert!(rx.with_full_text.try_recv().is_err());
        assert!(rx.without_full_text.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_waits_for_capacity() {
        let (router, mut rx) = OutputRouter::new(1);
        router.route(item("first", true)).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            router.route(item("second", true)),
        )
        .await;
        assert!(blocked.is_err());

        rx.with_full_text.recv().await.unwrap();
        router.route(item("third", true)).await.unwrap();
        assert_eq!(rx.with_full_text.recv().await.unwrap().title, "third");
    }

    #[tokio::test]
    async fn test_route_after_close() {
        let (router, rx) = OutputRouter::new(1);
        drop(rx);
        let result = router.route(item("x", false)).await;
        assert!(matches!(result, Err(PollerError::Sink(_))));
    }

    #[tokio::test]
    async fn test_queues_close_when_router_dropped() {
        let (router, mut rx) = OutputRouter::new(2);
        router.route(item("last", false)).await.unwrap();
        drop(router);

        assert_eq!(rx.without_full_text.recv().await.unwrap().title, "last");
        assert!(rx.without_full_text.recv().await.is_none());
        assert!(rx.with_full_text.recv().await.is_none());
    }
}
