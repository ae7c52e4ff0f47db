//! Pawmeet Engine - real-time conversation and meetup coordination
//!
//! This crate is the client-side core of the Pawmeet dog meetup app:
//!
//! - **ConversationDirectory**: resolves each conversation's counterpart dog
//!   and owner concurrently and publishes recency-sorted cards
//! - **MessageStreamSubscriber**: one live, full-snapshot message
//!   subscription per instance
//! - **UnreadTracker**: unread flags against persisted, monotonic watermarks
//! - **OutboundDispatcher**: validated, single-flight message sends
//! - **MeetupCoordinator**: meetup proposal state machine with
//!   direction-aware permissions and post-transition reloads
//!
//! Remote concerns sit behind the traits in [`backend`]; [`HttpBackend`]
//! implements them over the REST API.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pawmeet_engine::{
//!     ConversationBackend, ConversationDirectory, DirectoryBuilder, EngineConfig, HttpBackend,
//!     StaticTokenProvider,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> pawmeet_engine::Result<()> {
//! let config = EngineConfig::default();
//! let backend = Arc::new(HttpBackend::new(&config, Arc::new(StaticTokenProvider::new("token")))?);
//!
//! let directory = ConversationDirectory::new(DirectoryBuilder::new(
//!     backend.clone(),
//!     config.directory_concurrency,
//! ));
//! directory.reload(backend.as_ref(), "my-dog-id").await?;
//!
//! for card in directory.cards() {
//!     println!("{} ({})", card.dog.name, card.owner.display_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod meetup;
pub mod models;
pub mod stream;
pub mod timestamp;
pub mod unread;

pub use backend::{
    ConversationBackend, HttpBackend, MeetupBackend, MessageFeed, ProfileDirectory,
    StaticTokenProvider, TokenProvider,
};
pub use config::{EngineConfig, SnapshotDecodePolicy};
pub use directory::{ConversationDirectory, DirectoryBuilder, RefreshOutcome};
pub use dispatcher::{DispatcherState, OutboundDispatcher, SendContext};
pub use error::{EngineError, Result};
pub use meetup::{
    can_propose, Direction, ListFilter, MeetupAction, MeetupCoordinator, MeetupKind,
    MeetupStatus, MeetupSummary, NewProposal, ProposalTarget,
};
pub use models::{
    Conversation, ConversationCard, Dog, DogMode, LastMessage, Message, MessageKind, Owner,
};
pub use stream::{MessageStreamSubscriber, SubscriptionState};
pub use unread::{MemoryWatermarks, UnreadTracker, WatermarkStorage};
