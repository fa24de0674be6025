//! Contact, group and identity records served by the backend

use crate::model::message::UserId;
use serde::{Deserialize, Serialize};

/// Backend identifier of a contact row
pub type ContactId = i64;
/// Backend identifier of a group
pub type GroupId = i64;

/// A row of the current user's address book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact row ID
    pub id: ContactId,
    /// Linked user account, if the contact is registered
    #[serde(default)]
    pub contact_user_id: Option<UserId>,
    /// Local alias chosen by the owner
    #[serde(default)]
    pub alias: Option<String>,
    /// Contact e-mail
    #[serde(default)]
    pub email: Option<String>,
    /// Username of the linked account
    #[serde(default)]
    pub username: Option<String>,
    /// Preview of the last exchanged message
    #[serde(default)]
    pub last_message: Option<String>,
}

impl Contact {
    /// Create a contact linked to a user account
    pub fn new(id: ContactId, contact_user_id: Option<UserId>, username: impl Into<String>) -> Self {
        Self {
            id,
            contact_user_id,
            alias: None,
            email: None,
            username: Some(username.into()),
            last_message: None,
        }
    }

    /// Name shown in the conversation list: username, else alias
    pub fn display_name(&self) -> String {
        [self.username.as_deref(), self.alias.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// A chat group the current user belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group ID
    pub id: GroupId,
    /// Group name
    #[serde(default)]
    pub name: String,
    /// Creator account
    #[serde(default)]
    pub creator_id: Option<UserId>,
    /// Creator username
    #[serde(default)]
    pub creator_username: Option<String>,
    /// Member accounts
    #[serde(default)]
    pub members: Vec<UserId>,
    /// Member usernames
    #[serde(default)]
    pub member_usernames: Vec<String>,
    /// Preview of the last message
    #[serde(default)]
    pub last_message: Option<String>,
}

impl Group {
    /// Create a group with a name and no members
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            creator_id: None,
            creator_username: None,
            members: Vec::new(),
            member_usernames: Vec::new(),
            last_message: None,
        }
    }
}

/// Identity of the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User ID
    pub id: UserId,
    /// Login name
    #[serde(default)]
    pub username: String,
    /// E-mail address
    #[serde(default)]
    pub email: Option<String>,
}
