//! Queue drainers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::sink::ItemSink;
use crate::ingest::Item;

/// Drains one output queue into a sink under a fixed topic.
pub struct Publisher {
    sink: Arc<dyn ItemSink>,
    topic: String,
    timeout: Duration,
}

impl Publisher {
    pub fn new(sink: Arc<dyn ItemSink>, topic: impl Into<String>, timeout: Duration) -> Self {
        Self {
            sink,
            topic: topic.into(),
            timeout,
        }
    }

    /// Publish until the queue closes and is empty. Returns the number of
    /// items delivered.
    ///
    /// Failed or timed-out deliveries are logged and skipped.
    pub async fn run(self, mut rx: mpsc::Receiver<Item>) -> usize {
        let mut delivered = 0;

        while let Some(item) = rx.recv().await {
            let publish = self.sink.publish(&self.topic, &item.fingerprint, &item);
            match tokio::time::timeout(self.timeout, publish).await {
                Ok(Ok(())) => {
                    delivered += 1;
                    debug!("Published {} to {}", item.link, self.topic);
                }
                Ok(Err(e)) => warn!("Failed to publish {} to {}: {}", item.link, self.topic, e),
                Err(_) => warn!(
                    "Publishing {} to {} timed out after {}s",
                    item.link,
                    self.topic,
                    self.timeout.as_secs()
                ),
            }
        }

        info!("Publisher for {} stopped ({} delivered)", self.topic, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PollerError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ItemSink for RecordingSink {
        async fn publish(&self, topic: &str, key: &str, item: &Item) -> Result<()> {
            if item.title == "reject" {
                return Err(PollerError::Sink("rejected".into()));
            }
            if item.title == "hang" {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.seen
                .lock()
                .unwrap()
                .push((topic.to_string(), key.to_string()));
            Ok(())
        }
    }

    fn item(title: &str) -> Item {
        Item {
            title: title.into(),
            description: String::new(),
            full_text: String::new(),
            link: format!("https://a.example/{title}"),
            name: "A".into(),
            category: String::new(),
            enclosure: String::new(),
            pub_date: Utc::now(),
            fingerprint: format!("fp-{title}"),
            has_full_text: true,
            changed: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_until_closed() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(8);
        for title in ["a", "reject", "hang", "b"] {
            tx.send(item(title)).await.unwrap();
        }
        drop(tx);

        let publisher = Publisher::new(sink.clone(), "preprocessor", Duration::from_secs(5));
        let delivered = publisher.run(rx).await;

        assert_eq!(delivered, 2);
        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("preprocessor".to_string(), "fp-a".to_string()),
                ("preprocessor".to_string(), "fp-b".to_string()),
            ]
        );
    }
}
