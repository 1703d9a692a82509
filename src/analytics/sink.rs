//! Destination for flushed click data.

use std::sync::Arc;

use crate::storage::{ClickEvent, Storage};

#[async_trait::async_trait]
pub trait ClickSink: Send + Sync {
    /// Apply buffered counter deltas, one entry per link id.
    async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> anyhow::Result<()>;

    /// Append click telemetry facts.
    async fn append_events(&self, events: Vec<ClickEvent>) -> anyhow::Result<()>;
}

/// Sink writing through to the storage backend.
pub struct StorageSink {
    storage: Arc<dyn Storage>,
}

impl StorageSink {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl ClickSink for StorageSink {
    async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> anyhow::Result<()> {
        self.storage.flush_clicks(updates).await?;
        Ok(())
    }

    async fn append_events(&self, events: Vec<ClickEvent>) -> anyhow::Result<()> {
        self.storage.append_click_events(events).await?;
        Ok(())
    }
}
