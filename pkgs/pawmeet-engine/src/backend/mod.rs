//! Collaborator interfaces the engine talks to
//!
//! The engine never reaches the network directly. Every remote concern sits
//! behind one of these traits:
//!
//! - **TokenProvider**: short-lived bearer tokens, fetched before every call
//! - **ConversationBackend**: conversation listing/creation, message sends
//! - **ProfileDirectory**: dog and owner profile lookups
//! - **MessageFeed**: live, full-snapshot message subscriptions
//! - **MeetupBackend**: proposal creation, status mutations, listings
//!
//! [`HttpBackend`] implements all of them against the REST API.

mod feed;
mod http;

pub use feed::poll_snapshots;
pub use http::HttpBackend;

use crate::error::Result;
use crate::meetup::{MeetupKind, MeetupStatus, MeetupSummary, NewProposal};
use crate::models::{Conversation, Dog, OutgoingMessage, Owner};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One raw delivery of every message document in a conversation
pub type RawSnapshot = Vec<serde_json::Value>;

/// Live sequence of raw snapshots; errors do not end the stream
pub type SnapshotStream = BoxStream<'static, Result<RawSnapshot>>;

/// Source of bearer tokens for backend calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// Fixed token, e.g. one passed on the command line
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Every conversation visible to the caller
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>>;

    /// Open a conversation with another dog/owner pair, returning its id
    async fn create_conversation(
        &self,
        counterpart_dog_id: &str,
        counterpart_user_id: &str,
    ) -> Result<String>;

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn fetch_dog(&self, dog_id: &str) -> Result<Dog>;
    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner>;
}

#[async_trait]
pub trait MessageFeed: Send + Sync {
    /// Start a live subscription; dropping the stream ends it
    async fn watch(&self, conversation_id: &str) -> Result<SnapshotStream>;
}

#[async_trait]
pub trait MeetupBackend: Send + Sync {
    async fn create_proposal(&self, proposal: &NewProposal) -> Result<()>;

    async fn update_status(
        &self,
        conversation_id: &str,
        proposal_id: &str,
        status: MeetupStatus,
        counterpart_user_id: &str,
    ) -> Result<()>;

    async fn cancel(
        &self,
        conversation_id: &str,
        proposal_id: &str,
        counterpart_user_id: &str,
    ) -> Result<()>;

    async fn complete(&self, conversation_id: &str, proposal_id: &str) -> Result<()>;

    async fn fetch_user_meetups(
        &self,
        user_id: &str,
        kind: Option<MeetupKind>,
        status: Option<MeetupStatus>,
    ) -> Result<Vec<MeetupSummary>>;
}
