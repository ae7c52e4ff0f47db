//! Conversation, message and profile data structures

use crate::timestamp::{self, parse_or_oldest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a message or of a conversation's last-message preview
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Meetup,
    System,
}

/// Preview of the newest message, maintained by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub text: String,
    pub timestamp: String,
    pub sender_id: String,
    pub kind: MessageKind,
}

/// A persistent channel between two dog/owner pairs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub dog_ids: Vec<String>,
    pub user_ids: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub puppy_mode: bool,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
}

impl Conversation {
    /// Raw timestamp of the newest activity (last message, else creation)
    pub fn freshest_raw(&self) -> &str {
        self.last_message
            .as_ref()
            .map(|m| m.timestamp.as_str())
            .unwrap_or(&self.created_at)
    }

    /// Parsed newest-activity timestamp, `None` when the data is malformed
    pub fn freshest_timestamp(&self) -> Option<DateTime<Utc>> {
        timestamp::parse_timestamp(self.freshest_raw())
    }

    /// Newest-activity timestamp for ordering; malformed values sort oldest
    pub fn recency(&self) -> DateTime<Utc> {
        parse_or_oldest(self.freshest_raw())
    }

    /// The other dog in this conversation, seen from `my_dog_id`
    pub fn counterpart_dog_id(&self, my_dog_id: &str) -> Option<&str> {
        counterpart(&self.dog_ids, my_dog_id)
    }

    /// The other owner in this conversation, seen from `my_user_id`
    pub fn counterpart_user_id(&self, my_user_id: &str) -> Option<&str> {
        counterpart(&self.user_ids, my_user_id)
    }
}

/// Pick the participant that is not `me`
///
/// Participant lists must hold exactly two distinct ids, one of them `me`.
fn counterpart<'a>(participants: &'a [String], me: &str) -> Option<&'a str> {
    match participants {
        [a, b] if a != b => {
            if a == me {
                Some(b.as_str())
            } else if b == me {
                Some(a.as_str())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A single chat message, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sender_dog_id: String,
    pub receiver_dog_id: String,
    #[serde(with = "timestamp::lenient")]
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    #[serde(default)]
    pub meetup_id: Option<String>,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Message payload submitted to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    #[serde(skip)]
    pub conversation_id: String,
    pub text: String,
    pub receiver_id: String,
    pub sender_dog_id: String,
    pub receiver_dog_id: String,
}

/// Whether a dog is open to meetups
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DogMode {
    #[default]
    Social,
    Puppy,
}

impl fmt::Display for DogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DogMode::Social => write!(f, "social"),
            DogMode::Puppy => write!(f, "puppy"),
        }
    }
}

/// Dog profile snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dog {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub mode: DogMode,
}

/// Owner profile snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Display-ready join of a conversation with its counterpart dog and owner
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationCard {
    pub conversation: Conversation,
    pub dog: Dog,
    pub owner: Owner,
}

impl ConversationCard {
    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    pub fn recency(&self) -> DateTime<Utc> {
        self.conversation.recency()
    }

    pub fn preview(&self) -> Option<&str> {
        self.conversation
            .last_message
            .as_ref()
            .map(|m| m.text.as_str())
    }
}
