//! Live message stream for the open conversation
//!
//! A [`MessageStreamSubscriber`] owns at most one live subscription. Every
//! delivery is a full snapshot of the conversation, decoded, de-duplicated
//! and sorted ascending by timestamp, which consumers swap in wholesale.

use crate::backend::{MessageFeed, RawSnapshot, SnapshotStream};
use crate::config::SnapshotDecodePolicy;
use crate::error::Result;
use crate::models::Message;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Whether the subscriber currently holds a live subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribed { conversation_id: String },
}

struct ActiveSubscription {
    conversation_id: String,
    messages: watch::Receiver<Vec<Message>>,
    task: JoinHandle<()>,
}

pub struct MessageStreamSubscriber {
    feed: Arc<dyn MessageFeed>,
    policy: SnapshotDecodePolicy,
    active: Option<ActiveSubscription>,
}

impl MessageStreamSubscriber {
    pub fn new(feed: Arc<dyn MessageFeed>, policy: SnapshotDecodePolicy) -> Self {
        Self {
            feed,
            policy,
            active: None,
        }
    }

    /// Subscribe to `conversation_id`, tearing down any previous subscription
    ///
    /// The returned receiver starts empty and is replaced with each new
    /// snapshot. It closes once the subscription is torn down.
    pub async fn subscribe(
        &mut self,
        conversation_id: &str,
    ) -> Result<watch::Receiver<Vec<Message>>> {
        self.unsubscribe();

        let stream = self.feed.watch(conversation_id).await?;
        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(pump(
            conversation_id.to_string(),
            stream,
            tx,
            self.policy,
        ));

        info!(conversation_id = %conversation_id, "Subscribed to messages");
        self.active = Some(ActiveSubscription {
            conversation_id: conversation_id.to_string(),
            messages: rx.clone(),
            task,
        });

        Ok(rx)
    }

    /// Tear down the live subscription; safe to call at any time
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            info!(conversation_id = %active.conversation_id, "Unsubscribed from messages");
        }
    }

    pub fn state(&self) -> SubscriptionState {
        match &self.active {
            Some(active) => SubscriptionState::Subscribed {
                conversation_id: active.conversation_id.clone(),
            },
            None => SubscriptionState::Idle,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    /// Latest snapshot of the active subscription
    pub fn latest(&self) -> Option<Vec<Message>> {
        self.active.as_ref().map(|a| a.messages.borrow().clone())
    }
}

impl Drop for MessageStreamSubscriber {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn pump(
    conversation_id: String,
    mut stream: SnapshotStream,
    tx: watch::Sender<Vec<Message>>,
    policy: SnapshotDecodePolicy,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(raw) => match decode_snapshot(raw, policy) {
                Ok(messages) => {
                    debug!(conversation_id = %conversation_id, messages = messages.len(), "Snapshot delivered");
                    tx.send_replace(messages);
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, "Snapshot rejected, keeping previous: {}", e);
                }
            },
            Err(e) => {
                warn!(conversation_id = %conversation_id, "Live feed error: {}", e);
            }
        }
    }
    debug!(conversation_id = %conversation_id, "Live feed ended");
}

/// Decode a raw snapshot according to `policy`, then normalise it
pub fn decode_snapshot(raw: RawSnapshot, policy: SnapshotDecodePolicy) -> Result<Vec<Message>> {
    let mut messages = Vec::with_capacity(raw.len());

    for doc in raw {
        match serde_json::from_value::<Message>(doc) {
            Ok(message) => messages.push(message),
            Err(e) => match policy {
                SnapshotDecodePolicy::DropInvalid => {
                    warn!("Dropping undecodable message: {}", e);
                }
                SnapshotDecodePolicy::RejectSnapshot => return Err(e.into()),
            },
        }
    }

    Ok(normalize(messages))
}

/// Collapse duplicate ids (last one wins) and sort ascending by timestamp
pub fn normalize(messages: Vec<Message>) -> Vec<Message> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(messages.len());
    let mut unique: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match index.get(&message.id) {
            Some(&slot) => unique[slot] = message,
            None => {
                index.insert(message.id.clone(), unique.len());
                unique.push(message);
            }
        }
    }

    unique.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    unique
}
