//! Meetup lifecycle coordinator
//!
//! Every transition is a backend mutation followed by a full reload of the
//! viewer's proposal list; local statuses are never patched optimistically.
//! A failed transition marks the list dirty so the next read refetches it.

use super::status::{MeetupAction, MeetupStatus};
use super::types::{MeetupKind, MeetupSummary, NewProposal, ProposalTarget};
use crate::backend::MeetupBackend;
use crate::error::{EngineError, Result};
use crate::models::DogMode;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Filters applied to every proposal list reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub kind: Option<MeetupKind>,
    pub status: Option<MeetupStatus>,
}

/// Status mutations the backend exposes
#[derive(Debug, Clone, Copy)]
enum Mutation {
    Accept,
    Reject,
    Cancel,
    Complete,
}

impl Mutation {
    fn action(self) -> MeetupAction {
        match self {
            Mutation::Accept => MeetupAction::Accept,
            Mutation::Reject => MeetupAction::Reject,
            Mutation::Cancel => MeetupAction::Cancel,
            Mutation::Complete => MeetupAction::Complete,
        }
    }
}

/// New proposals need both dogs in social mode
pub fn can_propose(my_dog: DogMode, their_dog: DogMode) -> bool {
    my_dog == DogMode::Social && their_dog == DogMode::Social
}

pub struct MeetupCoordinator {
    backend: Arc<dyn MeetupBackend>,
    user_id: String,
    filter: Mutex<ListFilter>,
    summaries: watch::Sender<Vec<MeetupSummary>>,
    dirty: AtomicBool,
}

impl MeetupCoordinator {
    /// The list starts dirty so the first read fetches it
    pub fn new(backend: Arc<dyn MeetupBackend>, user_id: impl Into<String>) -> Self {
        let (summaries, _) = watch::channel(Vec::new());
        Self {
            backend,
            user_id: user_id.into(),
            filter: Mutex::new(ListFilter::default()),
            summaries,
            dirty: AtomicBool::new(true),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn filter(&self) -> ListFilter {
        *self.filter.lock()
    }

    /// Change the listing filter; the next read refetches
    pub fn set_filter(&self, kind: Option<MeetupKind>, status: Option<MeetupStatus>) {
        *self.filter.lock() = ListFilter { kind, status };
        self.dirty.store(true, Ordering::Release);
    }

    /// Last loaded list, without refetching
    pub fn cached(&self) -> Vec<MeetupSummary> {
        self.summaries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<MeetupSummary>> {
        self.summaries.subscribe()
    }

    /// Proposal list, refetched first if it is dirty
    pub async fn summaries(&self) -> Result<Vec<MeetupSummary>> {
        if self.is_dirty() {
            self.reload().await?;
        }
        Ok(self.cached())
    }

    /// Refetch the list from the backend, newest update first
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize> {
        let filter = self.filter();
        match self
            .backend
            .fetch_user_meetups(&self.user_id, filter.kind, filter.status)
            .await
        {
            Ok(mut list) => {
                list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                let count = list.len();
                self.summaries.send_replace(list);
                self.dirty.store(false, Ordering::Release);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load meetups: {}", e);
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Locally known summary for a proposal
    pub fn find(&self, proposal_id: &str) -> Option<MeetupSummary> {
        self.summaries
            .borrow()
            .iter()
            .find(|s| s.id == proposal_id)
            .cloned()
    }

    /// The non-terminal proposal that drives a conversation's affordances
    ///
    /// When the backend holds several, the most recently updated one wins.
    pub fn active_for(&self, conversation_id: &str) -> Option<MeetupSummary> {
        self.summaries
            .borrow()
            .iter()
            .filter(|s| s.conversation_id == conversation_id && !s.status.is_terminal())
            .max_by_key(|s| s.updated_at)
            .cloned()
    }

    /// The completed proposal a review may be attached to
    pub fn reviewable(&self, proposal_id: &str) -> Result<MeetupSummary> {
        let summary = self
            .find(proposal_id)
            .ok_or_else(|| EngineError::ProposalNotFound(proposal_id.to_string()))?;
        summary
            .status
            .authorize(MeetupAction::Review, summary.direction)?;
        Ok(summary)
    }

    /// Create a proposal after local checks, then reload the list
    #[instrument(skip(self, proposal), fields(conversation_id = %proposal.conversation_id))]
    pub async fn propose(
        &self,
        proposal: NewProposal,
        my_dog_mode: DogMode,
        their_dog_mode: DogMode,
    ) -> Result<()> {
        if !can_propose(my_dog_mode, their_dog_mode) {
            return Err(EngineError::PuppyModeActive);
        }
        if proposal.sender_user_id != self.user_id {
            return Err(EngineError::InvalidProposal(
                "sender must be the current user".to_string(),
            ));
        }
        proposal.validate()?;

        if let Err(e) = self.backend.create_proposal(&proposal).await {
            warn!("Failed to create meetup proposal: {}", e);
            return Err(e);
        }
        info!("Meetup proposed");

        self.reload_after_mutation().await;
        Ok(())
    }

    pub async fn accept(&self, target: &ProposalTarget) -> Result<()> {
        self.transition(target, Mutation::Accept).await
    }

    pub async fn reject(&self, target: &ProposalTarget) -> Result<()> {
        self.transition(target, Mutation::Reject).await
    }

    pub async fn cancel(&self, target: &ProposalTarget) -> Result<()> {
        self.transition(target, Mutation::Cancel).await
    }

    pub async fn complete(&self, target: &ProposalTarget) -> Result<()> {
        self.transition(target, Mutation::Complete).await
    }

    #[instrument(skip(self, target), fields(proposal_id = %target.proposal_id))]
    async fn transition(&self, target: &ProposalTarget, mutation: Mutation) -> Result<()> {
        let action = mutation.action();

        if self.is_dirty() {
            if let Err(e) = self.reload().await {
                warn!("Cannot refresh meetups before transition: {}", e);
            }
        }

        // Unknown proposals and unrefreshable lists go straight to the backend
        if !self.is_dirty() {
            if let Some(summary) = self.find(&target.proposal_id) {
                summary.status.authorize(action, summary.direction)?;
            }
        }

        let conversation_id = target.conversation_id.as_str();
        let proposal_id = target.proposal_id.as_str();
        let counterpart = target.counterpart_user_id.as_str();

        let result = match mutation {
            Mutation::Accept => {
                self.backend
                    .update_status(conversation_id, proposal_id, MeetupStatus::Accepted, counterpart)
                    .await
            }
            Mutation::Reject => {
                self.backend
                    .update_status(conversation_id, proposal_id, MeetupStatus::Rejected, counterpart)
                    .await
            }
            Mutation::Cancel => {
                self.backend
                    .cancel(conversation_id, proposal_id, counterpart)
                    .await
            }
            Mutation::Complete => self.backend.complete(conversation_id, proposal_id).await,
        };

        if let Err(e) = result {
            warn!(%action, "Meetup transition failed: {}", e);
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }

        info!(%action, "Meetup transition applied");
        self.reload_after_mutation().await;
        Ok(())
    }

    /// A mutation already succeeded; a failed reload only leaves the list dirty
    async fn reload_after_mutation(&self) {
        if let Err(e) = self.reload().await {
            warn!("List left dirty after mutation: {}", e);
        }
    }
}
