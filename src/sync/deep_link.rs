//! Deep links pre-selecting a conversation

use crate::model::{ContactId, Conversation, ConversationKey, ConversationKind, GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation target carried by navigation query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLink {
    /// `?contact=<contact row id>`
    Contact(ContactId),
    /// `?user=<linked user id>`
    User(UserId),
    /// `?group=<group id>`
    Group(GroupId),
}

impl DeepLink {
    /// Parse a query string such as `?group=7` or `tab=chat&contact=3`
    ///
    /// The first recognised parameter wins; unparsable values are ignored.
    pub fn from_query(query: &str) -> Option<Self> {
        query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(name, value)| {
                let id = value.trim().parse::<i64>().ok()?;
                match name.trim() {
                    "contact" | "contactId" => Some(DeepLink::Contact(id)),
                    "user" | "userId" | "contactUserId" => Some(DeepLink::User(id)),
                    "group" | "groupId" => Some(DeepLink::Group(id)),
                    _ => None,
                }
            })
    }

    /// Find the conversation this link targets
    pub fn resolve(&self, conversations: &[Conversation]) -> Option<ConversationKey> {
        conversations
            .iter()
            .find(|conversation| match (*self, conversation.kind) {
                (DeepLink::Contact(id), ConversationKind::Private) => conversation.id == id,
                (DeepLink::User(id), ConversationKind::Private) => {
                    conversation.counterpart_user_id == Some(id)
                }
                (DeepLink::Group(id), ConversationKind::Group) => conversation.id == id,
                _ => false,
            })
            .map(Conversation::key)
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeepLink::Contact(id) => write!(f, "contact={}", id),
            DeepLink::User(id) => write!(f, "user={}", id),
            DeepLink::Group(id) => write!(f, "group={}", id),
        }
    }
}

/// Result of trying to resolve the pending deep link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No link pending
    Idle,
    /// Contacts or groups not loaded yet; the link stays pending
    Deferred,
    /// The target conversation is now active
    Activated(ConversationKey),
    /// Both collections loaded and nothing matched; the link was dropped
    NotFound(DeepLink),
}
