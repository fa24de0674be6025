//! Request and response bodies exchanged with the backend

use crate::model::{Contact, Group, GroupId, Message, MessageType, UserId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `GET /contacts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactsResponse {
    /// Address book rows
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// Body of `GET /groups`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupsResponse {
    /// Groups the user belongs to
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// One page of `GET /messages/group/{id}/paged`
///
/// The server orders `content` newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPage {
    /// Messages of this page
    #[serde(default)]
    pub content: Vec<Message>,
    /// No older page exists
    #[serde(default)]
    pub last: bool,
    /// Total number of pages
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Total number of messages
    #[serde(default)]
    pub total_elements: Option<u64>,
    /// Index of this page
    #[serde(default)]
    pub number: Option<u32>,
}

impl GroupPage {
    /// Whether an older page can still be requested
    ///
    /// An empty page ends pagination even if `last` was omitted.
    pub fn has_more(&self) -> bool {
        !self.last && !self.content.is_empty()
    }
}

/// Body of `POST /messages` and `POST /messages/send-file`
///
/// `receiverId` and `groupId` are always serialized, one of them as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Recipient of a private message
    pub receiver_id: Option<UserId>,
    /// Target group
    pub group_id: Option<GroupId>,
    /// Text, or file name for file messages
    pub content: String,
    /// Payload kind
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Attachment path (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_path: Option<String>,
    /// Attachment MIME type (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,
    /// Attachment size (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_size: Option<i64>,
    /// Attachment width (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub width: Option<i32>,
    /// Attachment height (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub height: Option<i32>,
    /// Attachment duration (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<f64>,
    /// Thumbnail path (structured file messages only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumbnail_path: Option<String>,
}

impl SendMessageRequest {
    /// Envelope without attachment fields
    pub fn new(
        receiver_id: Option<UserId>,
        group_id: Option<GroupId>,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            receiver_id,
            group_id,
            content: content.into(),
            message_type,
            file_path: None,
            mime_type: None,
            file_size: None,
            width: None,
            height: None,
            duration: None,
            thumbnail_path: None,
        }
    }

    /// Copy the upload metadata into the body
    pub fn with_file_fields(mut self, file: &UploadedFile) -> Self {
        self.file_path = Some(file.file_path.clone());
        self.mime_type = file.mime_type.clone();
        self.file_size = file.file_size.as_deref().and_then(|v| v.trim().parse().ok());
        self.width = file.width.as_deref().and_then(|v| v.trim().parse().ok());
        self.height = file.height.as_deref().and_then(|v| v.trim().parse().ok());
        self.duration = file.duration.as_deref().and_then(|v| v.trim().parse().ok());
        self.thumbnail_path = file.thumbnail_path.clone();
        self
    }
}

/// Body returned by the send endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Server-confirmed message
    pub data: Message,
    /// Human-readable status
    #[serde(default)]
    pub message: Option<String>,
}

/// Metadata returned by `POST /messages/upload`
///
/// The backend reports numeric fields as strings; numbers and strings are
/// both accepted and kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Stored path
    pub file_path: String,
    /// Detected MIME type
    #[serde(default, deserialize_with = "lenient_string")]
    pub mime_type: Option<String>,
    /// Size in bytes
    #[serde(default, deserialize_with = "lenient_string")]
    pub file_size: Option<String>,
    /// Width of images/videos
    #[serde(default, deserialize_with = "lenient_string")]
    pub width: Option<String>,
    /// Height of images/videos
    #[serde(default, deserialize_with = "lenient_string")]
    pub height: Option<String>,
    /// Duration of audio/videos
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: Option<String>,
    /// Generated thumbnail
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail_path: Option<String>,
}

impl UploadedFile {
    /// `filePath|mimeType|fileSize|width|height|duration|thumbnailPath`
    ///
    /// Absent fields become empty segments, so the string always has seven.
    pub fn to_delimited(&self) -> String {
        [
            Some(self.file_path.as_str()),
            self.mime_type.as_deref(),
            self.file_size.as_deref(),
            self.width.as_deref(),
            self.height.as_deref(),
            self.duration.as_deref(),
            self.thumbnail_path.as_deref(),
        ]
        .into_iter()
        .map(|field| field.unwrap_or(""))
        .collect::<Vec<_>>()
        .join("|")
    }
}

/// A file to upload
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    /// Original file name, also used as message content
    pub file_name: String,
    /// MIME type announced in the multipart part, if known
    pub mime_type: Option<String>,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// Create an upload from memory
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    /// Announce a MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk
    pub async fn from_path<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| crate::Error::InvalidInput(format!("{} has no file name", path.display())))?;
        Ok(Self::new(file_name, bytes))
    }
}

/// Extract the error text from a backend error body
///
/// Uses the `error` field when the body is JSON, the raw body otherwise,
/// and `fallback` when the body is empty.
pub fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(text)) = map.get("error") {
            return text.clone();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}
