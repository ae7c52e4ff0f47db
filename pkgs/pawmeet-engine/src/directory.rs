//! Conversation directory: turns raw conversations into display cards
//!
//! A pass resolves, for every conversation, the counterpart dog and that
//! dog's owner. Resolutions fan out concurrently; lookups are de-duplicated
//! through caches that live only for the pass. A conversation whose
//! counterpart cannot be determined, or whose lookups fail, is dropped from
//! the result without failing the pass.
//!
//! [`ConversationDirectory`] wraps the builder with supersession: starting a
//! refresh cancels any pass still in flight, and a cancelled pass never
//! publishes.

use crate::backend::{ConversationBackend, ProfileDirectory};
use crate::error::Result;
use crate::models::{Conversation, ConversationCard, Dog, Owner};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Single-flight lookup table scoped to one pass
struct PassCache<T> {
    entries: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> PassCache<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `key`, running `fetch` at most once concurrently
    ///
    /// Failures are not cached; a later caller retries.
    async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cell = self.entries.lock().entry(key.to_string()).or_default().clone();
        cell.get_or_try_init(fetch).await.cloned()
    }
}

/// Builds one directory pass
pub struct DirectoryBuilder {
    profiles: Arc<dyn ProfileDirectory>,
    concurrency: usize,
}

impl DirectoryBuilder {
    pub fn new(profiles: Arc<dyn ProfileDirectory>, concurrency: usize) -> Self {
        Self {
            profiles,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve every conversation and return cards newest-first
    #[instrument(skip_all, fields(conversations = conversations.len()))]
    pub async fn build(
        &self,
        conversations: Vec<Conversation>,
        my_dog_id: &str,
    ) -> Vec<ConversationCard> {
        let dogs = PassCache::<Dog>::new();
        let owners = PassCache::<Owner>::new();

        let mut cards: Vec<ConversationCard> = stream::iter(conversations)
            .map(|conversation| self.resolve(conversation, my_dog_id, &dogs, &owners))
            .buffer_unordered(self.concurrency)
            .filter_map(|card| async move { card })
            .collect()
            .await;

        sort_newest_first(&mut cards);
        debug!(cards = cards.len(), "Directory pass finished");
        cards
    }

    async fn resolve(
        &self,
        conversation: Conversation,
        my_dog_id: &str,
        dogs: &PassCache<Dog>,
        owners: &PassCache<Owner>,
    ) -> Option<ConversationCard> {
        let Some(dog_id) = conversation.counterpart_dog_id(my_dog_id).map(str::to_owned) else {
            debug!(conversation_id = %conversation.id, "No counterpart dog, skipping");
            return None;
        };

        let dog = match dogs
            .get_or_fetch(&dog_id, || self.profiles.fetch_dog(&dog_id))
            .await
        {
            Ok(dog) => dog,
            Err(e) => {
                warn!(conversation_id = %conversation.id, dog_id = %dog_id, "Dog lookup failed: {}", e);
                return None;
            }
        };

        let owner = match owners
            .get_or_fetch(&dog.owner_id, || self.profiles.fetch_owner(&dog.owner_id))
            .await
        {
            Ok(owner) => owner,
            Err(e) => {
                warn!(conversation_id = %conversation.id, owner_id = %dog.owner_id, "Owner lookup failed: {}", e);
                return None;
            }
        };

        Some(ConversationCard {
            conversation,
            dog,
            owner,
        })
    }
}

/// Order by newest activity; ids break ties so the order is stable
pub fn sort_newest_first(cards: &mut [ConversationCard]) {
    cards.sort_by(|a, b| {
        b.recency()
            .cmp(&a.recency())
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Result of a [`ConversationDirectory::refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The pass finished first and its cards are now current
    Published(usize),
    /// A newer pass started; this pass's results were discarded
    Superseded,
}

struct ActivePass {
    generation: u64,
    token: CancellationToken,
}

/// Published card list with last-pass-wins refreshes
pub struct ConversationDirectory {
    builder: DirectoryBuilder,
    active: Mutex<ActivePass>,
    cards: watch::Sender<Vec<ConversationCard>>,
}

impl ConversationDirectory {
    pub fn new(builder: DirectoryBuilder) -> Self {
        let (cards, _) = watch::channel(Vec::new());
        Self {
            builder,
            active: Mutex::new(ActivePass {
                generation: 0,
                token: CancellationToken::new(),
            }),
            cards,
        }
    }

    /// Currently published cards
    pub fn cards(&self) -> Vec<ConversationCard> {
        self.cards.borrow().clone()
    }

    /// Receiver notified whenever a pass publishes
    pub fn subscribe(&self) -> watch::Receiver<Vec<ConversationCard>> {
        self.cards.subscribe()
    }

    /// Run a pass over `conversations`, cancelling any pass in flight
    pub async fn refresh(
        &self,
        conversations: Vec<Conversation>,
        my_dog_id: &str,
    ) -> RefreshOutcome {
        let (generation, token) = {
            let mut active = self.active.lock();
            active.token.cancel();
            active.generation += 1;
            active.token = CancellationToken::new();
            (active.generation, active.token.clone())
        };

        let cards = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(generation, "Directory pass cancelled");
                return RefreshOutcome::Superseded;
            }
            cards = self.builder.build(conversations, my_dog_id) => cards,
        };

        // Check and publish under the lock so a newer pass cannot slip in
        let active = self.active.lock();
        if active.generation != generation || token.is_cancelled() {
            debug!(generation, "Directory pass superseded before publish");
            return RefreshOutcome::Superseded;
        }

        let count = cards.len();
        self.cards.send_replace(cards);
        drop(active);

        info!(generation, cards = count, "Conversation directory updated");
        RefreshOutcome::Published(count)
    }

    /// Fetch the caller's conversations and refresh from them
    pub async fn reload(
        &self,
        backend: &dyn ConversationBackend,
        my_dog_id: &str,
    ) -> Result<RefreshOutcome> {
        let conversations = backend.fetch_conversations().await?;
        Ok(self.refresh(conversations, my_dog_id).await)
    }
}
