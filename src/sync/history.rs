//! Per-conversation message history and pagination state

use crate::model::{ConversationKey, Message, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Load lifecycle of a conversation's history
///
/// `Idle -> Loading -> Loaded | Failed`, and back to `Loading` on the next
/// request. A failure never touches the messages already held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Nothing requested yet
    Idle,
    /// A request is outstanding
    Loading {
        /// Requested page
        page: u32,
        /// Whether the result replaces the history
        reset: bool,
    },
    /// Last request applied
    Loaded,
    /// Last request failed
    Failed(String),
}

/// Pagination cursor of the active conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Last page applied
    pub page: u32,
    /// Whether an older page may exist
    pub has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 0,
            has_more: true,
        }
    }
}

/// Message history of one conversation, ordered oldest first
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    key: ConversationKey,
    messages: Vec<Message>,
    cursor: PageCursor,
    state: LoadState,
    applied: bool,
}

impl ConversationHistory {
    /// Empty history with a fresh cursor
    pub fn new(key: ConversationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
            cursor: PageCursor::default(),
            state: LoadState::Idle,
            applied: false,
        }
    }

    /// Conversation this history belongs to
    pub fn key(&self) -> ConversationKey {
        self.key
    }

    /// Messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Pagination cursor
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Load state
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Whether a request is outstanding
    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    /// Whether at least one page was applied since the history was created
    pub fn has_loaded(&self) -> bool {
        self.applied
    }

    /// Whether a load-more request may be issued now
    ///
    /// Requires the newest page to be held; until then the cursor says nothing
    /// about older pages.
    pub fn can_load_more(&self) -> bool {
        self.applied && self.cursor.has_more && !self.is_loading()
    }

    /// Enter `Loading`
    pub(crate) fn begin(&mut self, page: u32, reset: bool) {
        self.state = LoadState::Loading { page, reset };
    }

    /// Enter `Failed`, keeping the current messages
    pub(crate) fn fail(&mut self, reason: String) {
        self.state = LoadState::Failed(reason);
    }

    /// Merge a fetched page and enter `Loaded`
    ///
    /// The page is sorted oldest first. With `reset` it replaces the history;
    /// otherwise it is prepended, minus any message already held.
    /// Returns the number of messages added.
    pub(crate) fn apply(&mut self, page: u32, mut fetched: Vec<Message>, has_more: bool, reset: bool) -> usize {
        fetched.sort_by_key(Message::chronological_key);

        let mut seen: HashSet<MessageId> = if reset {
            HashSet::new()
        } else {
            self.messages.iter().map(|m| m.id).collect()
        };
        fetched.retain(|m| seen.insert(m.id));
        let added = fetched.len();

        if reset {
            self.messages = fetched;
        } else {
            fetched.append(&mut self.messages);
            self.messages = fetched;
        }

        self.cursor = PageCursor { page, has_more };
        self.state = LoadState::Loaded;
        self.applied = true;
        added
    }
}
