//! Downstream sinks.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ingest::Item;
use crate::{PollerError, Result};

/// Header carrying the message key on HTTP deliveries.
pub const KEY_HEADER: &str = "X-Message-Key";

/// Destination of routed items.
#[async_trait]
pub trait ItemSink: Send + Sync {
    /// Deliver one item to `topic`, keyed by `key`.
    async fn publish(&self, topic: &str, key: &str, item: &Item) -> Result<()>;
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    key: &'a str,
    item: &'a Item,
}

/// Encode one delivery as a JSON line (without the trailing newline).
pub fn encode_line(topic: &str, key: &str, item: &Item) -> Result<String> {
    serde_json::to_string(&Envelope { topic, key, item })
        .map_err(|e| PollerError::Sink(format!("failed to encode item: {}", e)))
}

/// Writes one JSON object per item.
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl ItemSink for JsonLinesSink {
    async fn publish(&self, topic: &str, key: &str, item: &Item) -> Result<()> {
        let line = encode_line(topic, key, item)?;
        let mut out = self.out.lock().await;
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// POSTs each item as JSON to `{base}/{topic}`.
pub struct HttpSink {
    client: Client,
    base: String,
}

impl HttpSink {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollerError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, topic: &str) -> String {
        format!("{}/{}", self.base, topic)
    }
}

#[async_trait]
impl ItemSink for HttpSink {
    async fn publish(&self, topic: &str, key: &str, item: &Item) -> Result<()> {
        self.client
            .post(self.endpoint(topic))
            .header(KEY_HEADER, key)
            .json(item)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PollerError::Sink(format!("delivery to {} failed: {}", topic, e)))?;
        Ok(())
    }
}
