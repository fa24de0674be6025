//! Chat Sync CLI
//!
//! Drives the conversation synchronizer against a running backend.

use anyhow::{bail, Context};
use chat_sync::api::{FileUpload, HttpChatApi};
use chat_sync::config::ClientConfig;
use chat_sync::model::{Message, MessageType, UserId};
use chat_sync::session::{FileSession, SessionProvider};
use chat_sync::sync::{ConversationSync, DeepLink, LoadOutcome, Resolution, SyncOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chat-sync", version, about = "Conversation sync client for the chat backend")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "chat-sync.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored bearer token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that mount the synchronizer against the backend
#[derive(Subcommand)]
enum RemoteCommand {
    /// Show the authenticated user
    Whoami,
    /// List contacts and groups as conversations
    Conversations,
    /// Print the history of a conversation
    History {
        #[command(flatten)]
        target: Target,
        /// Number of pages to load (group conversations)
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Send a text or a file to a conversation
    Send {
        #[command(flatten)]
        target: Target,
        /// Text to send
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// File to upload and send
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a token
    Set { token: String },
    /// Forget the token
    Clear,
    /// Print whether a token is stored
    Show,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Contact row id
    #[arg(long)]
    contact: Option<i64>,
    /// Linked user id of a contact
    #[arg(long)]
    user: Option<i64>,
    /// Group id
    #[arg(long)]
    group: Option<i64>,
}

impl Target {
    fn deep_link(&self) -> anyhow::Result<DeepLink> {
        match (self.contact, self.user, self.group) {
            (Some(id), None, None) => Ok(DeepLink::Contact(id)),
            (None, Some(id), None) => Ok(DeepLink::User(id)),
            (None, None, Some(id)) => Ok(DeepLink::Group(id)),
            _ => bail!("exactly one of --contact, --user or --group is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chat_sync::init();

    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_env_overrides();
    let session = Arc::new(FileSession::load(&config.session_path)?);

    match cli.command {
        Command::Token { action } => token(action, session.as_ref()),
        Command::Remote(command) => run(command, &config, session).await,
    }
}

fn token(action: TokenAction, session: &FileSession) -> anyhow::Result<()> {
    match action {
        TokenAction::Set { token } => {
            session.set_token(token)?;
            println!("Token stored in {}", session.path().display());
        }
        TokenAction::Clear => {
            session.clear()?;
            println!("Token cleared");
        }
        TokenAction::Show => {
            if session.is_authenticated() {
                println!("Token present ({})", session.path().display());
            } else {
                println!("No token stored");
            }
        }
    }
    Ok(())
}

async fn run(command: RemoteCommand, config: &ClientConfig, session: Arc<FileSession>) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        bail!("no token stored; run `chat-sync token set <TOKEN>` first");
    }

    let api = HttpChatApi::new(config, session)?;
    let options = SyncOptions {
        auto_acknowledge: false,
        ..SyncOptions::from(config)
    };
    let sync = ConversationSync::new(Arc::new(api), options);

    let result = execute(command, &sync).await;
    if let Err(e) = &result {
        if e.downcast_ref::<chat_sync::Error>().is_some_and(chat_sync::Error::is_auth_expired) {
            eprintln!("Session expired; the stored token was cleared.");
        }
    }
    result
}

async fn execute(command: RemoteCommand, sync: &ConversationSync) -> anyhow::Result<()> {
    sync.mount().await?;

    match command {
        RemoteCommand::Whoami => {
            if let Some(user) = sync.current_user().await {
                println!("{} (id {})", user.username, user.id);
                if let Some(email) = user.email {
                    println!("{}", email);
                }
            }
        }
        RemoteCommand::Conversations => {
            for conversation in sync.conversations().await {
                let preview = if conversation.last_message_preview.is_empty() {
                    String::new()
                } else {
                    format!("  {}", conversation.last_message_preview)
                };
                println!("{:<12} {}{}", conversation.key().to_string(), conversation.name, preview);
            }
        }
        RemoteCommand::History { target, pages } => {
            activate(sync, target.deep_link()?).await?;
            for _ in 1..pages {
                match sync.load_more().await? {
                    LoadOutcome::Applied { .. } => {}
                    LoadOutcome::Skipped | LoadOutcome::Stale => break,
                }
            }
            print_history(sync).await;
            let report = sync.acknowledge().await?;
            if report.issued() > 0 {
                println!(
                    "-- acknowledged: {} delivered, {} read, {} failed",
                    report.delivered, report.read, report.failed
                );
            }
        }
        RemoteCommand::Send { target, text, file } => {
            activate(sync, target.deep_link()?).await?;
            let message = match (text, file) {
                (Some(text), None) => sync.send_text(&text).await?,
                (None, Some(path)) => {
                    let upload = FileUpload::from_path(&path).await?;
                    sync.send_file(&upload).await?
                }
                _ => bail!("one of --text or --file is required"),
            };
            println!("Sent message {}", message.id);
            print_history(sync).await;
        }
    }
    Ok(())
}

async fn activate(sync: &ConversationSync, link: DeepLink) -> anyhow::Result<()> {
    match sync.open_deep_link(link).await? {
        Resolution::Activated(_) => Ok(()),
        Resolution::NotFound(link) => bail!("no conversation matches {}", link),
        Resolution::Deferred | Resolution::Idle => bail!("contacts and groups are not loaded"),
    }
}

async fn print_history(sync: &ConversationSync) {
    let me = sync.current_user_id().await.unwrap_or_default();
    if let Some(cursor) = sync.cursor().await {
        if cursor.has_more {
            println!("-- older messages available (page {})", cursor.page);
        }
    }
    for message in sync.messages().await {
        println!("{}", format_message(&message, me));
    }
}

fn format_message(message: &Message, me: UserId) -> String {
    let time = message
        .sent_at
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let author = if message.is_authored_by(me) {
        "me".to_string()
    } else {
        message
            .sender_label(me)
            .unwrap_or_else(|| message.sender_id.to_string())
    };
    let body = match message.message_type {
        MessageType::Text => message.content.clone(),
        MessageType::File => format!(
            "[file] {} ({})",
            message.content,
            message.download_path().unwrap_or_default()
        ),
    };
    let status = if message.is_authored_by(me) {
        format!(" {}", message.delivery_status().indicator())
    } else {
        String::new()
    };
    format!("[{}] {}: {}{}", time, author, body, status)
}
