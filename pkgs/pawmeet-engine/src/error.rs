//! Error types for engine operations

use crate::meetup::{Direction, MeetupAction, MeetupStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    // Transient network / server failures
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),
    #[error("Storage error: {0}")]
    Storage(String),

    // Malformed data
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Conversation {0} has no resolvable counterpart")]
    MissingCounterpart(String),

    // Local precondition violations
    #[error("Draft is empty")]
    EmptyDraft,
    #[error("No conversation context selected")]
    NoContext,
    #[error("A message is already being sent")]
    SendInProgress,
    #[error("Meetups are not available while a dog is in puppy mode")]
    PuppyModeActive,
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),
    #[error("Cannot {action} a meetup that is {status}")]
    TransitionNotAllowed {
        status: MeetupStatus,
        action: MeetupAction,
    },
    #[error("The {direction} side of a meetup cannot {action}")]
    NotPermitted {
        action: MeetupAction,
        direction: Direction,
    },
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),
}

impl EngineError {
    /// True for errors raised locally before any network call was made
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::EmptyDraft
                | EngineError::NoContext
                | EngineError::SendInProgress
                | EngineError::PuppyModeActive
                | EngineError::InvalidProposal(_)
                | EngineError::TransitionNotAllowed { .. }
                | EngineError::NotPermitted { .. }
        )
    }

    /// True for per-item data defects that callers drop rather than surface
    pub fn is_malformed_data(&self) -> bool {
        matches!(
            self,
            EngineError::Decode(_) | EngineError::MissingCounterpart(_)
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}

impl From<sea_orm::DbErr> for EngineError {
    fn from(err: sea_orm::DbErr) -> Self {
        EngineError::Storage(err.to_string())
    }
}
