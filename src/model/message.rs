//! Message structures and delivery status tracking

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Backend identifier of a user
pub type UserId = i64;
/// Backend identifier of a message
pub type MessageId = i64;

/// Message payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text message
    #[default]
    Text,
    /// Message carrying an uploaded attachment
    File,
}

/// Delivery status of a message as seen by its author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Stored by the server, not yet fetched by the recipient
    Sent,
    /// Fetched by the recipient
    Delivered,
    /// Viewed by the recipient
    Read,
}

impl DeliveryStatus {
    /// Human-readable indicator
    pub fn indicator(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent | DeliveryStatus::Delivered => "✓",
            DeliveryStatus::Read => "✓✓",
        }
    }

    /// Status label
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
        }
    }
}

/// A message as returned by the backend
///
/// Exactly one of `receiver_id` / `group_id` is set. The `delivered` and
/// `read` flags only ever move from `false` to `true` on the server; the
/// group paged endpoint omits them, so they default to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: MessageId,
    /// Author
    pub sender_id: UserId,
    /// Recipient of a private message
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    /// Group of a group message
    #[serde(default)]
    pub group_id: Option<i64>,
    /// Text content, or the original file name for file messages
    #[serde(default)]
    pub content: String,
    /// Payload kind
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Server-side path of the attachment
    #[serde(default)]
    pub file_path: Option<String>,
    /// Detected MIME type of the attachment
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Attachment size in bytes
    #[serde(default)]
    pub file_size: Option<i64>,
    /// Image/video width
    #[serde(default)]
    pub width: Option<i32>,
    /// Image/video height
    #[serde(default)]
    pub height: Option<i32>,
    /// Audio/video duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Server-side path of the generated thumbnail
    #[serde(default)]
    pub thumbnail_path: Option<String>,
    /// Display name of the author (group endpoints only)
    #[serde(default)]
    pub sender_username: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub sent_at: Option<NaiveDateTime>,
    /// Delivered to the recipient
    #[serde(default)]
    pub delivered: bool,
    /// Read by the recipient
    #[serde(default)]
    pub read: bool,
    /// Last edit timestamp
    #[serde(default)]
    pub edited_at: Option<NaiveDateTime>,
    /// Soft-deleted on the server
    #[serde(default)]
    pub deleted: bool,
}

impl Message {
    /// Create a text message (mostly useful for tests and fakes)
    pub fn text(id: MessageId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id,
            sender_id,
            receiver_id: None,
            group_id: None,
            content: content.into(),
            message_type: MessageType::Text,
            file_path: None,
            mime_type: None,
            file_size: None,
            width: None,
            height: None,
            duration: None,
            thumbnail_path: None,
            sender_username: None,
            sent_at: None,
            delivered: false,
            read: false,
            edited_at: None,
            deleted: false,
        }
    }

    /// Address this message to a user
    pub fn sent_to(mut self, receiver_id: UserId) -> Self {
        self.receiver_id = Some(receiver_id);
        self.group_id = None;
        self
    }

    /// Address this message to a group
    pub fn in_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self.receiver_id = None;
        self
    }

    /// Whether `user_id` wrote this message
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }

    /// Whether `user_id` is on the receiving side of this message
    ///
    /// Private messages are inbound when addressed to the user; group
    /// messages are inbound for every member except the author.
    pub fn is_inbound_for(&self, user_id: UserId) -> bool {
        if self.is_authored_by(user_id) {
            return false;
        }
        match (self.receiver_id, self.group_id) {
            (Some(receiver), _) => receiver == user_id,
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }

    /// Delivery status derived from the server flags
    pub fn delivery_status(&self) -> DeliveryStatus {
        if self.read {
            DeliveryStatus::Read
        } else if self.delivered {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        }
    }

    /// Label shown above group messages written by someone else
    pub fn sender_label(&self, current_user: UserId) -> Option<String> {
        if self.group_id.is_none() || self.is_authored_by(current_user) {
            return None;
        }
        Some(
            self.sender_username
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| self.sender_id.to_string()),
        )
    }

    /// Whether the attachment is an image with a thumbnail
    pub fn has_image_preview(&self) -> bool {
        self.message_type == MessageType::File
            && self.thumbnail_path.is_some()
            && self
                .mime_type
                .as_deref()
                .is_some_and(|mime| mime.starts_with("image/"))
    }

    /// Attachment path relative to the server root
    pub fn download_path(&self) -> Option<String> {
        self.file_path.as_deref().map(public_path)
    }

    /// Thumbnail path relative to the server root
    pub fn thumbnail_public_path(&self) -> Option<String> {
        self.thumbnail_path.as_deref().map(public_path)
    }

    /// Key used to keep history ordered oldest first
    pub(crate) fn chronological_key(&self) -> (Option<NaiveDateTime>, MessageId) {
        (self.sent_at, self.id)
    }
}

/// Strip leading `.`, `/` and `\` so a stored path can be appended to the server root
pub fn public_path(stored: &str) -> String {
    stored
        .trim_start_matches(|c| matches!(c, '.' | '/' | '\\'))
        .to_string()
}
