//! Meetup proposal state machine
//!
//! ```text
//! pending ──accept──▶ accepted ──complete──▶ completed ──review──▶ (completed)
//!    │                   │
//!    └──reject──▶ rejected└──cancel──▶ cancelled
//! ```
//!
//! `rejected`, `cancelled` and `completed` are terminal. Who may fire an
//! action depends on the viewer's [`Direction`] relative to the proposal.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a meetup proposal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MeetupStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

/// Something a viewer can do to a proposal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MeetupAction {
    Accept,
    Reject,
    Cancel,
    Complete,
    Review,
}

/// Viewer's side of a proposal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The viewer proposed the meetup
    #[serde(alias = "sent")]
    Outgoing,
    /// The viewer received the proposal
    #[serde(alias = "received")]
    Incoming,
}

impl MeetupAction {
    pub const ALL: [MeetupAction; 5] = [
        MeetupAction::Accept,
        MeetupAction::Reject,
        MeetupAction::Cancel,
        MeetupAction::Complete,
        MeetupAction::Review,
    ];

    /// Whether a viewer on `direction` may fire this action at all
    pub fn permitted_for(self, direction: Direction) -> bool {
        match (self, direction) {
            (MeetupAction::Accept | MeetupAction::Reject, Direction::Incoming) => true,
            (MeetupAction::Accept | MeetupAction::Reject, Direction::Outgoing) => false,
            (MeetupAction::Cancel | MeetupAction::Complete | MeetupAction::Review, _) => true,
        }
    }
}

impl MeetupStatus {
    /// Status reached by applying `action`, or an error if the table has no edge
    ///
    /// `review` leaves a completed meetup completed.
    pub fn apply(self, action: MeetupAction) -> Result<MeetupStatus> {
        use MeetupAction as A;
        use MeetupStatus as S;

        match (self, action) {
            (S::Pending, A::Accept) => Ok(S::Accepted),
            (S::Pending, A::Reject) => Ok(S::Rejected),
            (S::Accepted, A::Cancel) => Ok(S::Cancelled),
            (S::Accepted, A::Complete) => Ok(S::Completed),
            (S::Completed, A::Review) => Ok(S::Completed),
            (S::Pending, A::Cancel | A::Complete | A::Review)
            | (S::Accepted, A::Accept | A::Reject | A::Review)
            | (S::Completed, A::Accept | A::Reject | A::Cancel | A::Complete)
            | (S::Rejected | S::Cancelled, _) => Err(EngineError::TransitionNotAllowed {
                status: self,
                action,
            }),
        }
    }

    /// Apply `action` on behalf of a viewer on `direction`
    pub fn authorize(self, action: MeetupAction, direction: Direction) -> Result<MeetupStatus> {
        let next = self.apply(action)?;
        if !action.permitted_for(direction) {
            return Err(EngineError::NotPermitted { action, direction });
        }
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MeetupStatus::Rejected | MeetupStatus::Cancelled | MeetupStatus::Completed
        )
    }

    pub fn allows_review(self) -> bool {
        self == MeetupStatus::Completed
    }

    /// Actions a viewer on `direction` can take right now
    ///
    /// An outgoing pending proposal yields nothing: the sender is awaiting
    /// a response.
    pub fn available_actions(self, direction: Direction) -> Vec<MeetupAction> {
        MeetupAction::ALL
            .into_iter()
            .filter(|action| self.authorize(*action, direction).is_ok())
            .collect()
    }
}

impl fmt::Display for MeetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetupStatus::Pending => "pending",
            MeetupStatus::Accepted => "accepted",
            MeetupStatus::Rejected => "rejected",
            MeetupStatus::Cancelled => "cancelled",
            MeetupStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MeetupStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(MeetupStatus::Pending),
            "accepted" => Ok(MeetupStatus::Accepted),
            "rejected" => Ok(MeetupStatus::Rejected),
            "cancelled" | "canceled" => Ok(MeetupStatus::Cancelled),
            "completed" => Ok(MeetupStatus::Completed),
            other => Err(EngineError::Decode(format!("unknown meetup status '{other}'"))),
        }
    }
}

impl fmt::Display for MeetupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetupAction::Accept => "accept",
            MeetupAction::Reject => "reject",
            MeetupAction::Cancel => "cancel",
            MeetupAction::Complete => "complete",
            MeetupAction::Review => "review",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => f.write_str("outgoing"),
            Direction::Incoming => f.write_str("incoming"),
        }
    }
}
