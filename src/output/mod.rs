//! Output routing and delivery.
//!
//! Items are split into two bounded queues by whether they carry full text,
//! and each queue is drained by a [`Publisher`] into an [`ItemSink`].

mod publisher;
mod router;
mod sink;

pub use publisher::Publisher;
pub use router::{OutputRouter, RouterReceivers, DEFAULT_QUEUE_CAPACITY};
pub use sink::{encode_line, HttpSink, ItemSink, JsonLinesSink, KEY_HEADER};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{OutputConfig, SinkKind};
use crate::Result;

/// Create the configured sink.
pub fn build_sink(config: &OutputConfig) -> Result<Arc<dyn ItemSink>> {
    let sink: Arc<dyn ItemSink> = match config.sink {
        SinkKind::Stdout => Arc::new(JsonLinesSink::stdout()),
        SinkKind::Http => Arc::new(HttpSink::new(
            &config.sink_addr,
            Duration::from_secs(config.publish_timeout_secs),
        )?),
    };
    Ok(sink)
}
