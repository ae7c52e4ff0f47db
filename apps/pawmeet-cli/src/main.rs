use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pawmeet_engine::{
    ConversationBackend, ConversationDirectory, Conversation, DirectoryBuilder, EngineConfig,
    HttpBackend, LastMessage, MeetupCoordinator, MeetupKind, MeetupStatus, MeetupSummary,
    Message, MessageStreamSubscriber, NewProposal, OutboundDispatcher, ProfileDirectory,
    ProposalTarget, RefreshOutcome, StaticTokenProvider, UnreadTracker,
};
use pawmeet_store::WatermarkStore;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Pawmeet - conversations and meetups for dog owners
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend API base URL
    #[arg(long, default_value = "http://localhost:8080/api")]
    base_url: String,

    /// Bearer token for the backend
    #[arg(long)]
    token: String,

    /// Signed-in user id
    #[arg(long)]
    user_id: String,

    /// Id of the dog acting in conversations
    #[arg(long)]
    dog_id: String,

    /// SQLite file holding unread watermarks
    #[arg(long, default_value = "pawmeet.db")]
    db: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List conversations, newest first, with unread markers
    Conversations,
    /// Follow a conversation live; lines typed on stdin are sent
    Open { conversation_id: String },
    /// Send one message
    Send {
        conversation_id: String,
        text: String,
    },
    /// Start a conversation with another dog
    Start {
        counterpart_dog_id: String,
        counterpart_user_id: String,
    },
    /// List meetup proposals
    Meetups {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long)]
        status: Option<MeetupStatus>,
    },
    /// Propose a meetup in a conversation
    Propose(ProposeArgs),
    /// Accept an incoming proposal
    Accept(TargetArgs),
    /// Reject an incoming proposal
    Reject(TargetArgs),
    /// Cancel an accepted meetup
    Cancel(TargetArgs),
    /// Mark an accepted meetup as completed
    Complete(TargetArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Sent,
    Received,
}

impl From<KindArg> for MeetupKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sent => MeetupKind::Sent,
            KindArg::Received => MeetupKind::Received,
        }
    }
}

#[derive(Args, Debug)]
struct ProposeArgs {
    conversation_id: String,

    /// Start time, RFC 3339
    #[arg(long)]
    start: DateTime<Utc>,

    /// End time, RFC 3339
    #[arg(long)]
    end: DateTime<Utc>,

    #[arg(long)]
    location: String,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    #[arg(long, default_value = "")]
    message: String,
}

#[derive(Args, Debug)]
struct TargetArgs {
    conversation_id: String,
    proposal_id: String,
    counterpart_user_id: String,
}

impl From<TargetArgs> for ProposalTarget {
    fn from(args: TargetArgs) -> Self {
        ProposalTarget {
            conversation_id: args.conversation_id,
            proposal_id: args.proposal_id,
            counterpart_user_id: args.counterpart_user_id,
        }
    }
}

/// Everything a subcommand may need, built once from the global flags
struct Session {
    user_id: String,
    dog_id: String,
    config: EngineConfig,
    backend: Arc<HttpBackend>,
    db: PathBuf,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let config = EngineConfig {
            base_url: cli.base_url.trim_end_matches('/').to_string(),
            ..EngineConfig::default()
        };
        let tokens = Arc::new(StaticTokenProvider::new(cli.token.clone()));
        let backend = Arc::new(HttpBackend::new(&config, tokens)?);

        Ok(Self {
            user_id: cli.user_id.clone(),
            dog_id: cli.dog_id.clone(),
            config,
            backend,
            db: cli.db.clone(),
        })
    }

    async fn unread_tracker(&self) -> Result<UnreadTracker> {
        let store = WatermarkStore::new(self.db.clone())
            .await
            .with_context(|| format!("Failed to open {}", self.db.display()))?;
        Ok(UnreadTracker::new(Arc::new(store)))
    }

    fn coordinator(&self) -> MeetupCoordinator {
        MeetupCoordinator::new(self.backend.clone(), self.user_id.clone())
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.backend
            .fetch_conversations()
            .await?
            .into_iter()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| anyhow!("Conversation {} not found", conversation_id))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let session = Session::new(&cli)?;
    debug!(base_url = %session.config.base_url, "Session ready");

    match cli.command {
        Command::Conversations => list_conversations(&session).await,
        Command::Open { conversation_id } => open_conversation(&session, &conversation_id).await,
        Command::Send {
            conversation_id,
            text,
        } => send_message(&session, &conversation_id, &text).await,
        Command::Start {
            counterpart_dog_id,
            counterpart_user_id,
        } => {
            let id = session
                .backend
                .create_conversation(&counterpart_dog_id, &counterpart_user_id)
                .await?;
            println!("{id}");
            Ok(())
        }
        Command::Meetups { kind, status } => {
            list_meetups(&session, kind.map(MeetupKind::from), status).await
        }
        Command::Propose(args) => propose(&session, args).await,
        Command::Accept(target) => {
            let coordinator = loaded_coordinator(&session).await;
            coordinator.accept(&target.into()).await?;
            print_meetups(&coordinator.cached());
            Ok(())
        }
        Command::Reject(target) => {
            let coordinator = loaded_coordinator(&session).await;
            coordinator.reject(&target.into()).await?;
            print_meetups(&coordinator.cached());
            Ok(())
        }
        Command::Cancel(target) => {
            let coordinator = loaded_coordinator(&session).await;
            coordinator.cancel(&target.into()).await?;
            print_meetups(&coordinator.cached());
            Ok(())
        }
        Command::Complete(target) => {
            let coordinator = loaded_coordinator(&session).await;
            coordinator.complete(&target.into()).await?;
            print_meetups(&coordinator.cached());
            Ok(())
        }
    }
}

async fn list_conversations(session: &Session) -> Result<()> {
    let conversations = session.backend.fetch_conversations().await?;
    let tracker = session.unread_tracker().await?;
    let unread: HashSet<String> = tracker.unread_ids(&conversations).await?.into_iter().collect();

    let directory = ConversationDirectory::new(DirectoryBuilder::new(
        session.backend.clone(),
        session.config.directory_concurrency,
    ));
    if let RefreshOutcome::Superseded = directory.refresh(conversations, &session.dog_id).await {
        bail!("Directory refresh was superseded");
    }

    let cards = directory.cards();
    if cards.is_empty() {
        println!("No conversations yet");
    }
    for card in cards {
        let marker = if unread.contains(card.id()) { "*" } else { " " };
        println!(
            "{} {}  {} ({})  {}",
            marker,
            card.id(),
            card.dog.name,
            card.owner.display_name,
            card.preview().unwrap_or("")
        );
    }
    Ok(())
}

async fn send_message(session: &Session, conversation_id: &str, text: &str) -> Result<()> {
    let conversation = session.conversation(conversation_id).await?;
    let dispatcher = OutboundDispatcher::new(session.backend.clone());
    if !dispatcher.set_context(&conversation, &session.user_id, &session.dog_id) {
        bail!("Cannot determine the recipient of {}", conversation_id);
    }
    dispatcher.send(text).await?;
    info!(conversation_id = %conversation_id, "Message sent");
    Ok(())
}

async fn open_conversation(session: &Session, conversation_id: &str) -> Result<()> {
    let mut conversation = session.conversation(conversation_id).await?;
    let tracker = session.unread_tracker().await?;

    let dispatcher = OutboundDispatcher::new(session.backend.clone());
    let can_send = dispatcher.set_context(&conversation, &session.user_id, &session.dog_id);
    if !can_send {
        warn!(conversation_id = %conversation_id, "Counterpart unknown, sending disabled");
    }

    let mut subscriber =
        MessageStreamSubscriber::new(session.backend.clone(), session.config.decode_policy);
    let mut messages = subscriber.subscribe(conversation_id).await?;

    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("Following {conversation_id}, Ctrl+C to quit");
    let mut printed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            changed = messages.changed() => {
                if changed.is_err() {
                    warn!("Message stream closed");
                    break;
                }
                let snapshot = messages.borrow_and_update().clone();
                for message in snapshot.iter() {
                    if printed.contains(&message.id) {
                        continue;
                    }
                    print_message(message, &session.user_id);
                    printed.insert(message.id.clone());
                }
                if let Some(newest) = snapshot.last() {
                    conversation.last_message = Some(last_message_of(newest));
                    if let Err(e) = tracker.mark_read(&conversation).await {
                        warn!("Failed to mark conversation read: {}", e);
                    }
                }
            }
            Some(line) = line_rx.recv() => {
                if !can_send {
                    println!("Sending is not available in this conversation");
                    continue;
                }
                if let Err(e) = dispatcher.send(&line).await {
                    println!("Send failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    subscriber.unsubscribe();
    Ok(())
}

fn last_message_of(message: &Message) -> LastMessage {
    LastMessage {
        text: message.text.clone(),
        timestamp: message.timestamp.to_rfc3339(),
        sender_id: message.sender_id.clone(),
        kind: message.kind,
    }
}

fn print_message(message: &Message, my_user_id: &str) {
    let who = if message.is_from(my_user_id) { "me" } else { "them" };
    println!(
        "[{}] {}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M"),
        who,
        message.text
    );
}

/// Coordinator with the list loaded so local permission checks apply
async fn loaded_coordinator(session: &Session) -> MeetupCoordinator {
    let coordinator = session.coordinator();
    if let Err(e) = coordinator.reload().await {
        warn!("Could not load meetups, deferring checks to the backend: {}", e);
    }
    coordinator
}

async fn list_meetups(
    session: &Session,
    kind: Option<MeetupKind>,
    status: Option<MeetupStatus>,
) -> Result<()> {
    let coordinator = session.coordinator();
    coordinator.set_filter(kind, status);
    print_meetups(&coordinator.summaries().await?);
    Ok(())
}

fn print_meetups(summaries: &[MeetupSummary]) {
    if summaries.is_empty() {
        println!("No meetups");
    }
    for summary in summaries {
        let actions: Vec<String> = summary
            .status
            .available_actions(summary.direction)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{}  {}  {} ({})  {} at {}  with {}  [{}]",
            summary.id,
            summary.conversation_id,
            summary.status,
            summary.direction,
            summary.proposed_start.format("%Y-%m-%d %H:%M"),
            summary.location_name,
            summary
                .counterpart_name
                .as_deref()
                .unwrap_or(&summary.counterpart_user_id),
            actions.join(", ")
        );
    }
}

async fn propose(session: &Session, args: ProposeArgs) -> Result<()> {
    let conversation = session.conversation(&args.conversation_id).await?;
    let receiver_user_id = conversation
        .counterpart_user_id(&session.user_id)
        .ok_or_else(|| anyhow!("Cannot determine the counterpart user"))?
        .to_string();
    let receiver_dog_id = conversation
        .counterpart_dog_id(&session.dog_id)
        .ok_or_else(|| anyhow!("Cannot determine the counterpart dog"))?
        .to_string();

    let my_dog = session.backend.fetch_dog(&session.dog_id).await?;
    let their_dog = session.backend.fetch_dog(&receiver_dog_id).await?;

    let proposal = NewProposal {
        conversation_id: args.conversation_id,
        proposed_start: args.start,
        proposed_end: args.end,
        location_name: args.location,
        latitude: args.lat,
        longitude: args.lon,
        message: args.message,
        sender_user_id: session.user_id.clone(),
        sender_dog_id: session.dog_id.clone(),
        receiver_user_id,
        receiver_dog_id,
    };

    let coordinator = session.coordinator();
    coordinator.propose(proposal, my_dog.mode, their_dog.mode).await?;
    print_meetups(&coordinator.cached());
    Ok(())
}
