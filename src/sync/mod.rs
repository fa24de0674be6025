//! Conversation synchronization
//!
//! [`ConversationSync`] owns the client-side state of the conversation view:
//! - `history` - per-conversation messages, cursor and load state
//! - `ack` - delivered/read acknowledgements for inbound messages
//! - `sender` - text and file sending
//! - `deep_link` - pre-selection from navigation parameters
//!
//! Every history request carries a ticket naming the conversation and the
//! generation it was issued under. Switching conversation, leaving the view
//! and every reset load start a new generation; a result whose ticket no
//! longer matches is dropped without touching state.

pub mod ack;
pub mod deep_link;
pub mod history;
pub mod sender;

use crate::api::{ChatApi, FileUpload};
use crate::config::ClientConfig;
use crate::model::{
    build_conversations, Contact, Conversation, ConversationKey, ConversationKind, CurrentUser,
    Group, Message, UserId,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use ack::{Ack, AckKind, AckLedger, AckReport};
pub use deep_link::{DeepLink, Resolution};
pub use history::{ConversationHistory, LoadState, PageCursor};

/// Tunables of [`ConversationSync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Page size requested for group history
    pub group_page_size: u32,
    /// Run the acknowledger in the background after each applied load
    pub auto_acknowledge: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            group_page_size: 20,
            auto_acknowledge: true,
        }
    }
}

impl From<&ClientConfig> for SyncOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            group_page_size: config.group_page_size,
            auto_acknowledge: config.auto_acknowledge,
        }
    }
}

/// Result of a history request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was merged into the history
    Applied {
        /// Messages added
        received: usize,
        /// Whether an older page may exist
        has_more: bool,
    },
    /// Not issued: a load is outstanding or there is nothing older
    Skipped,
    /// The selection moved on while the request was in flight; result dropped
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    key: ConversationKey,
    generation: u64,
}

struct FetchedPage {
    messages: Vec<Message>,
    has_more: bool,
}

#[derive(Default)]
struct SyncState {
    current_user: Option<CurrentUser>,
    contacts: Vec<Contact>,
    groups: Vec<Group>,
    contacts_loaded: bool,
    groups_loaded: bool,
    selected: Option<Conversation>,
    history: Option<ConversationHistory>,
    generation: u64,
    acks: AckLedger,
    pending_link: Option<DeepLink>,
    last_error: Option<String>,
}

impl SyncState {
    fn is_current(&self, ticket: Ticket) -> bool {
        self.generation == ticket.generation
            && self.selected.as_ref().map(Conversation::key) == Some(ticket.key)
    }

    fn conversations(&self) -> Vec<Conversation> {
        build_conversations(&self.contacts, &self.groups)
    }
}

/// Client-side state of the conversation view
///
/// Cheap to clone; clones share state. Shared state is never locked across
/// a network call.
///
/// # Example
/// ```rust,no_run
/// use chat_sync::api::HttpChatApi;
/// use chat_sync::config::ClientConfig;
/// use chat_sync::model::ConversationKey;
/// use chat_sync::session::MemorySession;
/// use chat_sync::sync::{ConversationSync, SyncOptions};
/// use std::sync::Arc;
///
/// # async fn example() -> chat_sync::Result<()> {
/// let config = ClientConfig::default();
/// let api = HttpChatApi::new(&config, Arc::new(MemorySession::with_token("token")))?;
/// let sync = ConversationSync::new(Arc::new(api), SyncOptions::from(&config));
///
/// sync.mount().await?;
/// for conversation in sync.conversations().await {
///     println!("{} {}", conversation.key(), conversation.name);
/// }
///
/// sync.select(ConversationKey::group(7)).await?;
/// sync.send_text("hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConversationSync {
    api: Arc<dyn ChatApi>,
    options: SyncOptions,
    state: Arc<Mutex<SyncState>>,
}

impl ConversationSync {
    /// Create a synchronizer over `api`
    pub fn new(api: Arc<dyn ChatApi>, options: SyncOptions) -> Self {
        Self {
            api,
            options,
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    /// Resolve the current user and load contacts and groups concurrently
    ///
    /// Each result is applied on its own; the first error is returned after
    /// all three settled. A pending deep link is resolved whenever contacts
    /// and groups are both loaded, even if the identity call failed.
    pub async fn mount(&self) -> Result<Resolution> {
        let (me, contacts, groups) = tokio::join!(
            self.api.current_user(),
            self.api.contacts(),
            self.api.groups()
        );

        let mut first_error = None;
        let directory_ready = {
            let mut state = self.state.lock().await;
            match me {
                Ok(user) => {
                    info!("Signed in as {} ({})", user.username, user.id);
                    state.current_user = Some(user);
                }
                Err(e) => first_error = Some(e),
            }
            Self::apply_directory(&mut state, contacts, groups, &mut first_error);
            state.contacts_loaded && state.groups_loaded
        };

        let Some(e) = first_error else {
            return self.resolve_pending_link().await;
        };
        if directory_ready {
            if let Err(link_error) = self.resolve_pending_link().await {
                warn!("Deep link could not be activated: {}", link_error);
            }
        }
        self.record_error(&e).await;
        Err(e)
    }

    /// Re-resolve the current user
    pub async fn refresh_identity(&self) -> Result<CurrentUser> {
        match self.api.current_user().await {
            Ok(user) => {
                self.state.lock().await.current_user = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    /// Reload contacts and groups concurrently, then resolve a pending deep link
    pub async fn refresh_directory(&self) -> Result<Resolution> {
        let (contacts, groups) = tokio::join!(self.api.contacts(), self.api.groups());

        let mut first_error = None;
        {
            let mut state = self.state.lock().await;
            Self::apply_directory(&mut state, contacts, groups, &mut first_error);
        }

        if let Some(e) = first_error {
            self.record_error(&e).await;
            return Err(e);
        }
        self.resolve_pending_link().await
    }

    fn apply_directory(
        state: &mut SyncState,
        contacts: Result<Vec<Contact>>,
        groups: Result<Vec<Group>>,
        first_error: &mut Option<Error>,
    ) {
        match contacts {
            Ok(contacts) => {
                debug!("Loaded {} contacts", contacts.len());
                state.contacts = contacts;
                state.contacts_loaded = true;
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
        match groups {
            Ok(groups) => {
                debug!("Loaded {} groups", groups.len());
                state.groups = groups;
                state.groups_loaded = true;
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    /// Conversation list: contacts first, then groups
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations()
    }

    /// Identity resolved at mount
    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.state.lock().await.current_user.clone()
    }

    /// Id of the identity resolved at mount
    pub async fn current_user_id(&self) -> Option<UserId> {
        self.state.lock().await.current_user.as_ref().map(|u| u.id)
    }

    /// Active conversation
    pub async fn selected(&self) -> Option<Conversation> {
        self.state.lock().await.selected.clone()
    }

    /// Messages of the active conversation, oldest first
    pub async fn messages(&self) -> Vec<Message> {
        self.state
            .lock()
            .await
            .history
            .as_ref()
            .map(|h| h.messages().to_vec())
            .unwrap_or_default()
    }

    /// Pagination cursor of the active conversation
    pub async fn cursor(&self) -> Option<PageCursor> {
        self.state.lock().await.history.as_ref().map(|h| h.cursor())
    }

    /// Load state of the active conversation
    pub async fn load_state(&self) -> Option<LoadState> {
        self.state
            .lock()
            .await
            .history
            .as_ref()
            .map(|h| h.state().clone())
    }

    /// Last error surfaced to the view, cleared by the next success
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// Make `key` the active conversation and load its newest page
    ///
    /// Discards the previous history and cursor. A private conversation whose
    /// contact is not linked to a user loads as empty without a request.
    pub async fn select(&self, key: ConversationKey) -> Result<LoadOutcome> {
        {
            let mut state = self.state.lock().await;
            let Some(conversation) = state.conversations().into_iter().find(|c| c.key() == key)
            else {
                let e = Error::InvalidInput(format!("Unknown conversation {}", key));
                warn!("{}", e);
                state.last_error = Some(e.to_string());
                return Err(e);
            };

            info!("Selected conversation {} ({})", key, conversation.name);
            state.selected = Some(conversation);
            state.history = Some(ConversationHistory::new(key));
            state.acks.clear();
            state.last_error = None;
            state.generation += 1;
        }
        self.load(0, true).await
    }

    /// Load the next older page of the active conversation
    ///
    /// Skipped while a load is outstanding or when nothing older exists.
    /// When no page has been applied yet (the first load failed), the newest
    /// page is loaded instead.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let (page, reset) = {
            let state = self.state.lock().await;
            let history = state
                .history
                .as_ref()
                .ok_or_else(|| Error::NotReady("No conversation selected".to_string()))?;
            if history.is_loading() {
                debug!("Load-more skipped for {}: load outstanding", history.key());
                return Ok(LoadOutcome::Skipped);
            }
            if !history.has_loaded() {
                debug!("Nothing applied yet for {}; loading newest page", history.key());
                (0, true)
            } else if history.can_load_more() {
                (history.cursor().page + 1, false)
            } else {
                debug!("Load-more skipped for {}: no older page", history.key());
                return Ok(LoadOutcome::Skipped);
            }
        };
        self.load(page, reset).await
    }

    /// Reload the newest page of the active conversation, replacing its history
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        self.load(0, true).await
    }

    /// Drop the selection and ignore every outstanding request
    pub async fn leave(&self) {
        let mut state = self.state.lock().await;
        if let Some(conversation) = state.selected.take() {
            debug!("Left conversation {}", conversation.key());
        }
        state.history = None;
        state.acks.clear();
        state.pending_link = None;
        state.generation += 1;
    }

    async fn load(&self, page: u32, reset: bool) -> Result<LoadOutcome> {
        let (ticket, conversation, user_id) = {
            let mut state = self.state.lock().await;
            let conversation = state
                .selected
                .clone()
                .ok_or_else(|| Error::NotReady("No conversation selected".to_string()))?;
            let key = conversation.key();

            if reset {
                state.generation += 1;
            }
            let generation = state.generation;
            let user_id = state.current_user.as_ref().map(|u| u.id);

            let history = state
                .history
                .get_or_insert_with(|| ConversationHistory::new(key));
            if !reset && history.is_loading() {
                return Ok(LoadOutcome::Skipped);
            }
            history.begin(page, reset);

            (Ticket { key, generation }, conversation, user_id)
        };

        let fetched = self.fetch_page(&conversation, user_id, page).await;

        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            debug!("Dropping stale page {} for {}", page, ticket.key);
            return Ok(LoadOutcome::Stale);
        }

        match fetched {
            Ok(FetchedPage { messages, has_more }) => {
                let Some(history) = state.history.as_mut() else {
                    return Ok(LoadOutcome::Stale);
                };
                let received = history.apply(page, messages, has_more, reset);
                debug!(
                    "Applied page {} of {}: {} new, has_more={}",
                    page, ticket.key, received, has_more
                );
                state.last_error = None;
                drop(state);

                if self.options.auto_acknowledge {
                    self.spawn_acknowledger();
                }
                Ok(LoadOutcome::Applied { received, has_more })
            }
            Err(e) => {
                warn!("Failed to load page {} of {}: {}", page, ticket.key, e);
                if let Some(history) = state.history.as_mut() {
                    history.fail(e.to_string());
                }
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_page(
        &self,
        conversation: &Conversation,
        user_id: Option<UserId>,
        page: u32,
    ) -> Result<FetchedPage> {
        match conversation.kind {
            ConversationKind::Private => {
                let Some(counterpart) = conversation.counterpart_user_id else {
                    warn!(
                        "Contact {} has no linked user; no messages available",
                        conversation.id
                    );
                    return Ok(FetchedPage {
                        messages: Vec::new(),
                        has_more: false,
                    });
                };
                let user_id = user_id
                    .ok_or_else(|| Error::NotReady("Current user not resolved".to_string()))?;
                let messages = self.api.private_history(user_id, counterpart).await?;
                Ok(FetchedPage {
                    messages,
                    has_more: false,
                })
            }
            ConversationKind::Group => {
                let group_page = self
                    .api
                    .group_history(conversation.id, page, self.options.group_page_size)
                    .await?;
                let has_more = group_page.has_more();
                Ok(FetchedPage {
                    messages: group_page.content,
                    has_more,
                })
            }
        }
    }

    /// Send a text message to the active conversation, then refresh its history
    pub async fn send_text(&self, input: &str) -> Result<Message> {
        let conversation = self.require_selection().await?;
        let result = sender::send_text(self.api.as_ref(), &conversation, input).await;
        self.after_send(conversation.key(), result).await
    }

    /// Upload and send a file to the active conversation, then refresh its history
    pub async fn send_file(&self, file: &FileUpload) -> Result<Message> {
        let conversation = self.require_selection().await?;
        let result = sender::send_file(self.api.as_ref(), &conversation, file).await;
        self.after_send(conversation.key(), result).await
    }

    async fn require_selection(&self) -> Result<Conversation> {
        self.state
            .lock()
            .await
            .selected
            .clone()
            .ok_or_else(|| Error::NotReady("No conversation selected".to_string()))
    }

    async fn after_send(&self, key: ConversationKey, result: Result<Message>) -> Result<Message> {
        match result {
            Ok(message) => {
                let still_selected = self
                    .state
                    .lock()
                    .await
                    .selected
                    .as_ref()
                    .map(Conversation::key)
                    == Some(key);
                if still_selected {
                    if let Err(e) = self.refresh().await {
                        warn!("Message {} sent but refresh of {} failed: {}", message.id, key, e);
                    }
                }
                Ok(message)
            }
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    /// Acknowledge inbound messages of the active conversation
    ///
    /// Issues a delivered and/or read acknowledgement for every inbound message
    /// whose flag is still false and that was not acknowledged before in this
    /// conversation. Failed acknowledgements become eligible for the next run.
    pub async fn acknowledge(&self) -> Result<AckReport> {
        let claimed = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let (Some(user), Some(history)) = (state.current_user.as_ref(), state.history.as_ref())
            else {
                return Ok(AckReport::default());
            };
            state.acks.claim(history.messages(), user.id)
        };

        if claimed.is_empty() {
            return Ok(AckReport::default());
        }
        debug!("Issuing {} acknowledgements", claimed.len());

        let results = ack::dispatch(self.api.as_ref(), &claimed).await;

        let mut report = AckReport::default();
        let mut auth_error = None;
        {
            let mut state = self.state.lock().await;
            for (ack, result) in results {
                match result {
                    Ok(()) => report.record_success(ack.kind),
                    Err(e) => {
                        warn!(
                            "{:?} acknowledgement for message {} failed: {}",
                            ack.kind, ack.message_id, e
                        );
                        report.failed += 1;
                        state.acks.release(&ack);
                        if e.is_auth_expired() {
                            auth_error.get_or_insert(e);
                        }
                    }
                }
            }
        }

        match auth_error {
            Some(e) => {
                self.record_error(&e).await;
                Err(e)
            }
            None => Ok(report),
        }
    }

    fn spawn_acknowledger(&self) {
        let sync = self.clone();
        tokio::spawn(async move {
            if let Err(e) = sync.acknowledge().await {
                warn!("Background acknowledgement failed: {}", e);
            }
        });
    }

    /// Remember `link` and activate its conversation once contacts and groups are loaded
    pub async fn open_deep_link(&self, link: DeepLink) -> Result<Resolution> {
        debug!("Deep link {} pending", link);
        self.state.lock().await.pending_link = Some(link);
        self.resolve_pending_link().await
    }

    /// Try to resolve the pending deep link
    ///
    /// Returns [`Resolution::Deferred`] without touching state until both
    /// contacts and groups have loaded at least once.
    pub async fn resolve_pending_link(&self) -> Result<Resolution> {
        let key = {
            let mut state = self.state.lock().await;
            let Some(link) = state.pending_link else {
                return Ok(Resolution::Idle);
            };
            if !(state.contacts_loaded && state.groups_loaded) {
                debug!("Deep link {} deferred until contacts and groups load", link);
                return Ok(Resolution::Deferred);
            }
            state.pending_link = None;
            match link.resolve(&state.conversations()) {
                Some(key) => key,
                None => {
                    warn!("Deep link {} matches no conversation", link);
                    return Ok(Resolution::NotFound(link));
                }
            }
        };

        info!("Deep link activates {}", key);
        self.select(key).await?;
        Ok(Resolution::Activated(key))
    }

    async fn record_error(&self, error: &Error) {
        if error.is_auth_expired() {
            warn!("Session expired; caller must sign in again");
        }
        self.state.lock().await.last_error = Some(error.to_string());
    }
}
