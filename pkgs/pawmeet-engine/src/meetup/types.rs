//! Meetup proposal data structures

use super::status::{Direction, MeetupStatus};
use crate::error::{EngineError, Result};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Listing filter: proposals the viewer sent or received
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeetupKind {
    Sent,
    Received,
}

impl fmt::Display for MeetupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeetupKind::Sent => f.write_str("sent"),
            MeetupKind::Received => f.write_str("received"),
        }
    }
}

/// Lightweight proposal listing entry, enriched by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetupSummary {
    pub id: String,
    pub conversation_id: String,
    pub status: MeetupStatus,
    pub direction: Direction,
    #[serde(with = "timestamp::lenient")]
    pub proposed_start: DateTime<Utc>,
    #[serde(with = "timestamp::lenient")]
    pub proposed_end: DateTime<Utc>,
    pub location_name: String,
    pub counterpart_user_id: String,
    #[serde(default)]
    pub counterpart_name: Option<String>,
    #[serde(default)]
    pub counterpart_dog_name: Option<String>,
    #[serde(default)]
    pub counterpart_dog_image: Option<String>,
    #[serde(with = "timestamp::lenient")]
    pub updated_at: DateTime<Utc>,
}

impl MeetupSummary {
    pub fn target(&self) -> ProposalTarget {
        ProposalTarget {
            conversation_id: self.conversation_id.clone(),
            proposal_id: self.id.clone(),
            counterpart_user_id: self.counterpart_user_id.clone(),
        }
    }

    pub fn can_review(&self) -> bool {
        self.status.allows_review()
    }
}

/// Addresses one proposal for a status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalTarget {
    pub conversation_id: String,
    pub proposal_id: String,
    /// Recipient of the backend's notification
    pub counterpart_user_id: String,
}

/// A meetup request about to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    #[serde(skip)]
    pub conversation_id: String,
    pub proposed_start: DateTime<Utc>,
    pub proposed_end: DateTime<Utc>,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub message: String,
    pub sender_user_id: String,
    pub sender_dog_id: String,
    pub receiver_user_id: String,
    pub receiver_dog_id: String,
}

impl NewProposal {
    /// Local sanity checks run before anything is sent
    pub fn validate(&self) -> Result<()> {
        if self.conversation_id.trim().is_empty() {
            return Err(invalid("missing conversation"));
        }
        if self.proposed_end <= self.proposed_start {
            return Err(invalid("meetup must end after it starts"));
        }
        if self.location_name.trim().is_empty() {
            return Err(invalid("location name is required"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude out of range"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid("longitude out of range"));
        }
        if self.sender_user_id == self.receiver_user_id || self.sender_dog_id == self.receiver_dog_id
        {
            return Err(invalid("sender and receiver must differ"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidProposal(reason.to_string())
}
