//! In-memory fake of the backend collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use pawmeet_engine::backend::{RawSnapshot, SnapshotStream};
use pawmeet_engine::{
    Conversation, ConversationBackend, Direction, Dog, DogMode, EngineError, LastMessage,
    MeetupBackend, MeetupKind, MeetupStatus, MeetupSummary, MessageFeed, MessageKind,
    NewProposal, Owner, ProfileDirectory, Result,
};
use pawmeet_engine::models::OutgoingMessage;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct FakeBackend {
    pub conversations: Mutex<Vec<Conversation>>,
    pub dogs: Mutex<HashMap<String, Dog>>,
    pub owners: Mutex<HashMap<String, Owner>>,
    pub failing_dogs: Mutex<HashSet<String>>,
    pub failing_owners: Mutex<HashSet<String>>,
    pub dog_delays: Mutex<HashMap<String, std::time::Duration>>,
    pub dog_fetches: Mutex<HashMap<String, usize>>,
    pub owner_fetches: Mutex<HashMap<String, usize>>,

    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub send_attempts: AtomicUsize,
    pub fail_sends: AtomicBool,
    pub send_delay: Mutex<Option<std::time::Duration>>,

    pub feeds: Mutex<Vec<(String, mpsc::UnboundedSender<Result<RawSnapshot>>)>>,

    pub meetups: Mutex<Vec<MeetupSummary>>,
    pub meetup_calls: Mutex<Vec<String>>,
    pub meetup_fetches: AtomicUsize,
    pub fail_mutations: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub created: Mutex<Vec<NewProposal>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dog(&self, dog_id: &str, name: &str, owner_id: &str, owner_name: &str) {
        self.dogs.lock().insert(
            dog_id.to_string(),
            Dog {
                id: dog_id.to_string(),
                name: name.to_string(),
                owner_id: owner_id.to_string(),
                image_url: None,
                mode: DogMode::Social,
            },
        );
        self.owners.lock().insert(
            owner_id.to_string(),
            Owner {
                id: owner_id.to_string(),
                display_name: owner_name.to_string(),
                avatar_url: None,
            },
        );
    }

    pub fn fail_dog(&self, dog_id: &str) {
        self.failing_dogs.lock().insert(dog_id.to_string());
    }

    pub fn fail_owner(&self, owner_id: &str) {
        self.failing_owners.lock().insert(owner_id.to_string());
    }

    pub fn delay_dog(&self, dog_id: &str, delay: std::time::Duration) {
        self.dog_delays.lock().insert(dog_id.to_string(), delay);
    }

    pub fn dog_fetch_count(&self, dog_id: &str) -> usize {
        self.dog_fetches.lock().get(dog_id).copied().unwrap_or(0)
    }

    pub fn owner_fetch_count(&self, owner_id: &str) -> usize {
        self.owner_fetches.lock().get(owner_id).copied().unwrap_or(0)
    }

    /// Push a snapshot into the most recent feed opened for `conversation_id`
    pub fn push_snapshot(&self, conversation_id: &str, snapshot: Result<RawSnapshot>) -> bool {
        let feeds = self.feeds.lock();
        feeds
            .iter()
            .rev()
            .find(|(id, _)| id == conversation_id)
            .map(|(_, tx)| tx.unbounded_send(snapshot).is_ok())
            .unwrap_or(false)
    }

    /// Number of feeds whose consumer is still attached
    pub fn open_feeds(&self) -> usize {
        self.feeds
            .lock()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn add_meetup(&self, summary: MeetupSummary) {
        self.meetups.lock().push(summary);
    }

    pub fn meetup_status(&self, proposal_id: &str) -> Option<MeetupStatus> {
        self.meetups
            .lock()
            .iter()
            .find(|m| m.id == proposal_id)
            .map(|m| m.status)
    }

    fn set_meetup_status(&self, proposal_id: &str, status: MeetupStatus) {
        if let Some(m) = self.meetups.lock().iter_mut().find(|m| m.id == proposal_id) {
            m.status = status;
            m.updated_at = Utc::now();
        }
    }

    fn mutation_result(&self) -> Result<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(EngineError::Http {
                status: 503,
                body: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConversationBackend for FakeBackend {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.conversations.lock().clone())
    }

    async fn create_conversation(
        &self,
        counterpart_dog_id: &str,
        counterpart_user_id: &str,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conversations.lock().push(conversation(
            &id,
            ["me-dog", counterpart_dog_id],
            ["me", counterpart_user_id],
            "2024-01-01T00:00:00Z",
            None,
        ));
        Ok(id)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(EngineError::Network("connection reset".to_string()));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for FakeBackend {
    async fn fetch_dog(&self, dog_id: &str) -> Result<Dog> {
        *self.dog_fetches.lock().entry(dog_id.to_string()).or_default() += 1;

        let delay = self.dog_delays.lock().get(dog_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.failing_dogs.lock().contains(dog_id) {
            return Err(EngineError::Http {
                status: 500,
                body: format!("dog {dog_id} unavailable"),
            });
        }
        self.dogs
            .lock()
            .get(dog_id)
            .cloned()
            .ok_or_else(|| EngineError::Http {
                status: 404,
                body: format!("no dog {dog_id}"),
            })
    }

    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner> {
        *self.owner_fetches.lock().entry(owner_id.to_string()).or_default() += 1;
        tokio::task::yield_now().await;

        if self.failing_owners.lock().contains(owner_id) {
            return Err(EngineError::Network("timeout".to_string()));
        }
        self.owners
            .lock()
            .get(owner_id)
            .cloned()
            .ok_or_else(|| EngineError::Http {
                status: 404,
                body: format!("no owner {owner_id}"),
            })
    }
}

#[async_trait]
impl MessageFeed for FakeBackend {
    async fn watch(&self, conversation_id: &str) -> Result<SnapshotStream> {
        let (tx, rx) = mpsc::unbounded();
        self.feeds.lock().push((conversation_id.to_string(), tx));
        Ok(rx.boxed())
    }
}

#[async_trait]
impl MeetupBackend for FakeBackend {
    async fn create_proposal(&self, proposal: &NewProposal) -> Result<()> {
        self.meetup_calls.lock().push("create".to_string());
        self.mutation_result()?;
        self.created.lock().push(proposal.clone());
        self.add_meetup(MeetupSummary {
            id: format!("p{}", self.created.lock().len()),
            conversation_id: proposal.conversation_id.clone(),
            status: MeetupStatus::Pending,
            direction: Direction::Outgoing,
            proposed_start: proposal.proposed_start,
            proposed_end: proposal.proposed_end,
            location_name: proposal.location_name.clone(),
            counterpart_user_id: proposal.receiver_user_id.clone(),
            counterpart_name: None,
            counterpart_dog_name: None,
            counterpart_dog_image: None,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_status(
        &self,
        _conversation_id: &str,
        proposal_id: &str,
        status: MeetupStatus,
        counterpart_user_id: &str,
    ) -> Result<()> {
        self.meetup_calls
            .lock()
            .push(format!("status:{proposal_id}:{status}:{counterpart_user_id}"));
        self.mutation_result()?;
        self.set_meetup_status(proposal_id, status);
        Ok(())
    }

    async fn cancel(
        &self,
        _conversation_id: &str,
        proposal_id: &str,
        counterpart_user_id: &str,
    ) -> Result<()> {
        self.meetup_calls
            .lock()
            .push(format!("cancel:{proposal_id}:{counterpart_user_id}"));
        self.mutation_result()?;
        self.set_meetup_status(proposal_id, MeetupStatus::Cancelled);
        Ok(())
    }

    async fn complete(&self, _conversation_id: &str, proposal_id: &str) -> Result<()> {
        self.meetup_calls
            .lock()
            .push(format!("complete:{proposal_id}"));
        self.mutation_result()?;
        self.set_meetup_status(proposal_id, MeetupStatus::Completed);
        Ok(())
    }

    async fn fetch_user_meetups(
        &self,
        _user_id: &str,
        kind: Option<MeetupKind>,
        status: Option<MeetupStatus>,
    ) -> Result<Vec<MeetupSummary>> {
        self.meetup_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(EngineError::Network("offline".to_string()));
        }
        Ok(self
            .meetups
            .lock()
            .iter()
            .filter(|m| match kind {
                Some(MeetupKind::Sent) => m.direction == Direction::Outgoing,
                Some(MeetupKind::Received) => m.direction == Direction::Incoming,
                None => true,
            })
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect())
    }
}

pub fn conversation(
    id: &str,
    dogs: [&str; 2],
    users: [&str; 2],
    created_at: &str,
    last_message_at: Option<&str>,
) -> Conversation {
    Conversation {
        id: id.to_string(),
        dog_ids: dogs.iter().map(|s| s.to_string()).collect(),
        user_ids: users.iter().map(|s| s.to_string()).collect(),
        created_at: created_at.to_string(),
        puppy_mode: false,
        last_message: last_message_at.map(|ts| LastMessage {
            text: "hello".to_string(),
            timestamp: ts.to_string(),
            sender_id: users[1].to_string(),
            kind: MessageKind::Text,
        }),
    }
}

pub fn summary(
    id: &str,
    conversation_id: &str,
    status: MeetupStatus,
    direction: Direction,
) -> MeetupSummary {
    let start: DateTime<Utc> = Utc::now() + Duration::days(1);
    MeetupSummary {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        status,
        direction,
        proposed_start: start,
        proposed_end: start + Duration::hours(1),
        location_name: "Dog park".to_string(),
        counterpart_user_id: "u2".to_string(),
        counterpart_name: Some("Sam".to_string()),
        counterpart_dog_name: Some("Rex".to_string()),
        counterpart_dog_image: None,
        updated_at: Utc::now(),
    }
}

pub fn message_doc(id: &str, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "text": format!("message {id}"),
        "senderId": "u1",
        "receiverId": "u2",
        "senderDogId": "d1",
        "receiverDogId": "d2",
        "timestamp": timestamp,
        "kind": "text"
    })
}
