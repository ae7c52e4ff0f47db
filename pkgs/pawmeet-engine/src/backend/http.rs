//! REST implementation of the backend collaborators

use super::{
    poll_snapshots, ConversationBackend, MeetupBackend, MessageFeed, ProfileDirectory,
    RawSnapshot, SnapshotStream, TokenProvider,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::meetup::{MeetupKind, MeetupStatus, MeetupSummary, NewProposal};
use crate::models::{Conversation, Dog, OutgoingMessage, Owner};
use async_trait::async_trait;
use futures::FutureExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP client for the Pawmeet API
///
/// Cheap to clone; clones share the connection pool and token provider.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    poll_interval: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationBody<'a> {
    counterpart_dog_id: &'a str,
    counterpart_user_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationReply {
    conversation_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody<'a> {
    status: MeetupStatus,
    counterpart_user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody<'a> {
    counterpart_user_id: &'a str,
}

impl HttpBackend {
    pub fn new(config: &EngineConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            EngineError::Backend(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            tokens,
            poll_interval: config.feed_poll_interval(),
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                EngineError::Backend(format!("base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    /// Start a request carrying a freshly fetched bearer token
    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        let token = self.tokens.token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn execute(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Unauthenticated(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let response = Self::execute(self.request(Method::GET, segments).await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<Response> {
        Self::execute(self.request(method, segments).await?.json(body)).await
    }
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>> {
        self.get_json(&["conversations"]).await
    }

    #[instrument(skip(self))]
    async fn create_conversation(
        &self,
        counterpart_dog_id: &str,
        counterpart_user_id: &str,
    ) -> Result<String> {
        let body = CreateConversationBody {
            counterpart_dog_id,
            counterpart_user_id,
        };
        let reply: CreateConversationReply = self
            .send_json(Method::POST, &["conversations"], &body)
            .await?
            .json()
            .await?;
        Ok(reply.conversation_id)
    }

    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id))]
    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let path = ["conversations", message.conversation_id.as_str(), "messages"];
        self.send_json(Method::POST, &path, message).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for HttpBackend {
    async fn fetch_dog(&self, dog_id: &str) -> Result<Dog> {
        self.get_json(&["dogs", dog_id]).await
    }

    async fn fetch_owner(&self, owner_id: &str) -> Result<Owner> {
        self.get_json(&["users", owner_id]).await
    }
}

#[async_trait]
impl MessageFeed for HttpBackend {
    async fn watch(&self, conversation_id: &str) -> Result<SnapshotStream> {
        debug!(conversation_id = %conversation_id, "Starting polling feed");

        let backend = self.clone();
        let conversation_id = conversation_id.to_string();
        let fetch = move || {
            let backend = backend.clone();
            let conversation_id = conversation_id.clone();
            async move {
                backend
                    .get_json::<RawSnapshot>(&["conversations", conversation_id.as_str(), "messages"])
                    .await
            }
            .boxed()
        };

        Ok(poll_snapshots(fetch, self.poll_interval))
    }
}

#[async_trait]
impl MeetupBackend for HttpBackend {
    #[instrument(skip(self, proposal), fields(conversation_id = %proposal.conversation_id))]
    async fn create_proposal(&self, proposal: &NewProposal) -> Result<()> {
        let path = ["conversations", proposal.conversation_id.as_str(), "meetups"];
        self.send_json(Method::POST, &path, proposal).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        conversation_id: &str,
        proposal_id: &str,
        status: MeetupStatus,
        counterpart_user_id: &str,
    ) -> Result<()> {
        let path = ["conversations", conversation_id, "meetups", proposal_id, "status"];
        let body = StatusBody {
            status,
            counterpart_user_id,
        };
        self.send_json(Method::PATCH, &path, &body).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel(
        &self,
        conversation_id: &str,
        proposal_id: &str,
        counterpart_user_id: &str,
    ) -> Result<()> {
        let path = ["conversations", conversation_id, "meetups", proposal_id, "cancel"];
        self.send_json(Method::POST, &path, &CancelBody { counterpart_user_id })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn complete(&self, conversation_id: &str, proposal_id: &str) -> Result<()> {
        let path = ["conversations", conversation_id, "meetups", proposal_id, "complete"];
        Self::execute(self.request(Method::POST, &path).await?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_user_meetups(
        &self,
        user_id: &str,
        kind: Option<MeetupKind>,
        status: Option<MeetupStatus>,
    ) -> Result<Vec<MeetupSummary>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(kind) = kind {
            query.push(("type", kind.to_string()));
        }
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }

        let path = ["users", user_id, "meetups"];
        let builder = self.request(Method::GET, &path).await?.query(&query);
        Ok(Self::execute(builder).await?.json().await?)
    }
}
