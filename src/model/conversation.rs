//! Unified conversation list built from contacts and groups

use crate::model::directory::{Contact, Group};
use crate::model::message::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Two users, backed by a contact row
    Private,
    /// A named member set
    Group,
}

/// Identity of a conversation
///
/// Contact and group ids share a numeric space, so the kind is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Contact row id or group id
    pub id: i64,
    /// Conversation kind
    pub kind: ConversationKind,
}

impl ConversationKey {
    /// Key of the private conversation backed by contact row `id`
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ConversationKind::Private,
        }
    }

    /// Key of group `id`
    pub fn group(id: i64) -> Self {
        Self {
            id,
            kind: ConversationKind::Group,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConversationKind::Private => write!(f, "private-{}", self.id),
            ConversationKind::Group => write!(f, "group-{}", self.id),
        }
    }
}

/// A conversation entry, derived and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Contact row id or group id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Conversation kind
    pub kind: ConversationKind,
    /// Other participant of a private conversation, when the contact is registered
    pub counterpart_user_id: Option<UserId>,
    /// Last message preview, empty when unknown
    pub last_message_preview: String,
}

impl Conversation {
    /// Identity of this conversation
    pub fn key(&self) -> ConversationKey {
        ConversationKey {
            id: self.id,
            kind: self.kind,
        }
    }

    /// Whether history can be requested for this conversation
    pub fn is_loadable(&self) -> bool {
        match self.kind {
            ConversationKind::Private => self.counterpart_user_id.is_some(),
            ConversationKind::Group => true,
        }
    }
}

impl From<&Contact> for Conversation {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            name: contact.display_name(),
            kind: ConversationKind::Private,
            counterpart_user_id: contact.contact_user_id,
            last_message_preview: contact.last_message.clone().unwrap_or_default(),
        }
    }
}

impl From<&Group> for Conversation {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            kind: ConversationKind::Group,
            counterpart_user_id: None,
            last_message_preview: group.last_message.clone().unwrap_or_default(),
        }
    }
}

/// Merge contacts and groups into one list: contacts first, then groups
///
/// Source order is kept inside each half; no other ordering is applied.
pub fn build_conversations(contacts: &[Contact], groups: &[Group]) -> Vec<Conversation> {
    contacts
        .iter()
        .map(Conversation::from)
        .chain(groups.iter().map(Conversation::from))
        .collect()
}
