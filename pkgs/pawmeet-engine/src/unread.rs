//! Unread tracking against persisted per-conversation watermarks

use crate::error::Result;
use crate::models::Conversation;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Keyed watermark storage (conversation id -> epoch millis)
#[async_trait]
pub trait WatermarkStorage: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<i64>>;

    /// Store `max(current, millis)` and return the value now in effect
    async fn store_max(&self, conversation_id: &str, millis: i64) -> Result<i64>;
}

#[async_trait]
impl WatermarkStorage for pawmeet_store::WatermarkStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<i64>> {
        Ok(self.get(conversation_id).await?)
    }

    async fn store_max(&self, conversation_id: &str, millis: i64) -> Result<i64> {
        Ok(self.advance(conversation_id, millis).await?)
    }
}

/// Process-local watermarks, lost on exit
#[derive(Default)]
pub struct MemoryWatermarks {
    marks: Mutex<HashMap<String, i64>>,
}

impl MemoryWatermarks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStorage for MemoryWatermarks {
    async fn load(&self, conversation_id: &str) -> Result<Option<i64>> {
        Ok(self.marks.lock().get(conversation_id).copied())
    }

    async fn store_max(&self, conversation_id: &str, millis: i64) -> Result<i64> {
        let mut marks = self.marks.lock();
        let entry = marks.entry(conversation_id.to_string()).or_insert(millis);
        *entry = (*entry).max(millis);
        Ok(*entry)
    }
}

/// Derives unread flags and advances watermarks on read
#[derive(Clone)]
pub struct UnreadTracker {
    storage: Arc<dyn WatermarkStorage>,
}

impl UnreadTracker {
    pub fn new(storage: Arc<dyn WatermarkStorage>) -> Self {
        Self { storage }
    }

    /// True iff the conversation's newest activity is after its watermark
    ///
    /// Conversations with malformed timestamps are never unread.
    pub async fn is_unread(&self, conversation: &Conversation) -> Result<bool> {
        let Some(freshest) = conversation.freshest_timestamp() else {
            return Ok(false);
        };

        let watermark = self
            .storage
            .load(&conversation.id)
            .await?
            .unwrap_or(i64::MIN);

        Ok(freshest.timestamp_millis() > watermark)
    }

    /// Acknowledge everything up to the conversation's newest activity
    ///
    /// Falls back to the current time when the conversation's timestamps
    /// cannot be parsed. Returns the watermark now in effect.
    #[instrument(skip_all, fields(conversation_id = %conversation.id))]
    pub async fn mark_read(&self, conversation: &Conversation) -> Result<i64> {
        let freshest = conversation.freshest_timestamp().unwrap_or_else(|| {
            debug!("Unparsable timestamp, marking read as of now");
            Utc::now()
        });

        self.storage
            .store_max(&conversation.id, freshest.timestamp_millis())
            .await
    }

    /// Ids of the unread conversations among `conversations`
    pub async fn unread_ids(&self, conversations: &[Conversation]) -> Result<Vec<String>> {
        let mut unread = Vec::new();
        for conversation in conversations {
            if self.is_unread(conversation).await? {
                unread.push(conversation.id.clone());
            }
        }
        Ok(unread)
    }
}
