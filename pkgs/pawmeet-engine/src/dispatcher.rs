//! Outbound message dispatcher
//!
//! Sends a single draft into the selected conversation. There is no local
//! echo: a sent message shows up only once the live message stream
//! delivers it back.

use crate::backend::ConversationBackend;
use crate::error::{EngineError, Result};
use crate::models::{Conversation, OutgoingMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// UI-facing dispatcher state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherState {
    pub draft: String,
    pub sending: bool,
    pub last_error: Option<String>,
}

/// Resolved addressing for the selected conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendContext {
    pub conversation_id: String,
    pub sender_user_id: String,
    pub sender_dog_id: String,
    pub receiver_user_id: String,
    pub receiver_dog_id: String,
}

pub struct OutboundDispatcher {
    backend: Arc<dyn ConversationBackend>,
    context: Mutex<Option<SendContext>>,
    sending: AtomicBool,
    state: watch::Sender<DispatcherState>,
}

impl OutboundDispatcher {
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        let (state, _) = watch::channel(DispatcherState::default());
        Self {
            backend,
            context: Mutex::new(None),
            sending: AtomicBool::new(false),
            state,
        }
    }

    /// Select the conversation to send into
    ///
    /// Fails, clearing any previous context, when either counterpart id
    /// cannot be derived from the participant lists.
    pub fn set_context(
        &self,
        conversation: &Conversation,
        caller_user_id: &str,
        caller_dog_id: &str,
    ) -> bool {
        let receiver_user = conversation.counterpart_user_id(caller_user_id);
        let receiver_dog = conversation.counterpart_dog_id(caller_dog_id);

        let (Some(receiver_user_id), Some(receiver_dog_id)) = (receiver_user, receiver_dog) else {
            warn!(conversation_id = %conversation.id, "Cannot resolve counterpart for sending");
            *self.context.lock() = None;
            self.state.send_modify(|s| {
                s.last_error = Some(EngineError::MissingCounterpart(conversation.id.clone()).to_string());
            });
            return false;
        };

        *self.context.lock() = Some(SendContext {
            conversation_id: conversation.id.clone(),
            sender_user_id: caller_user_id.to_string(),
            sender_dog_id: caller_dog_id.to_string(),
            receiver_user_id: receiver_user_id.to_string(),
            receiver_dog_id: receiver_dog_id.to_string(),
        });
        self.state.send_modify(|s| s.last_error = None);
        true
    }

    pub fn clear_context(&self) {
        *self.context.lock() = None;
    }

    pub fn context(&self) -> Option<SendContext> {
        self.context.lock().clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.draft = text);
    }

    pub fn state(&self) -> DispatcherState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatcherState> {
        self.state.subscribe()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Replace the draft with `text` and send it
    pub async fn send(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyDraft);
        }
        if self.is_sending() {
            return Err(EngineError::SendInProgress);
        }
        self.set_draft(text);
        self.resend().await
    }

    /// Send the current draft; on failure the draft is kept for a retry
    #[instrument(skip(self))]
    pub async fn resend(&self) -> Result<()> {
        let draft = self.state.borrow().draft.clone();
        if draft.trim().is_empty() {
            return Err(EngineError::EmptyDraft);
        }

        let Some(context) = self.context() else {
            self.state
                .send_modify(|s| s.last_error = Some(EngineError::NoContext.to_string()));
            return Err(EngineError::NoContext);
        };

        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::SendInProgress);
        }
        let _in_flight = InFlight { dispatcher: self };
        self.state.send_modify(|s| {
            s.sending = true;
            s.last_error = None;
        });

        let message = OutgoingMessage {
            conversation_id: context.conversation_id.clone(),
            text: draft.trim().to_string(),
            receiver_id: context.receiver_user_id,
            sender_dog_id: context.sender_dog_id,
            receiver_dog_id: context.receiver_dog_id,
        };

        let result = self.backend.send_message(&message).await;

        match result {
            Ok(()) => {
                info!(conversation_id = %context.conversation_id, "Message sent");
                // Edits made while the send was in flight survive
                self.state.send_modify(|s| {
                    if s.draft == draft {
                        s.draft.clear();
                    }
                });
                Ok(())
            }
            Err(e) => {
                warn!(conversation_id = %context.conversation_id, "Message send failed: {}", e);
                self.state.send_modify(|s| s.last_error = Some(e.to_string()));
                Err(e)
            }
        }
    }
}

/// Releases the single-flight slot when a send ends, even if it is dropped
struct InFlight<'a> {
    dispatcher: &'a OutboundDispatcher,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.dispatcher.sending.store(false, Ordering::Release);
        self.dispatcher.state.send_modify(|s| s.sending = false);
    }
}
