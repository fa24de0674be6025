//! Backend API access
//!
//! [`ChatApi`] is the seam between the synchronization core and the REST
//! backend. [`HttpChatApi`] talks to the real server; tests substitute an
//! in-memory implementation.

pub mod http;
pub mod wire;

use crate::model::{Contact, CurrentUser, Group, GroupId, Message, MessageId, UserId};
use crate::Result;
use async_trait::async_trait;

pub use http::HttpChatApi;
pub use wire::{FileUpload, GroupPage, SendMessageRequest, UploadedFile};

/// Calls consumed by the synchronization core
///
/// Every method is a single attempt. Implementations map a 401/403 to
/// [`crate::Error::AuthExpired`], a missing response to
/// [`crate::Error::Network`] and any other non-success status to
/// [`crate::Error::ServerRejected`].
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /test/me`
    async fn current_user(&self) -> Result<CurrentUser>;

    /// `GET /contacts`
    async fn contacts(&self) -> Result<Vec<Contact>>;

    /// `GET /groups`
    async fn groups(&self) -> Result<Vec<Group>>;

    /// Whole private exchange between two users, oldest first
    async fn private_history(&self, user1: UserId, user2: UserId) -> Result<Vec<Message>>;

    /// One page of group history, newest first within the page
    async fn group_history(&self, group_id: GroupId, page: u32, size: u32) -> Result<GroupPage>;

    /// Send a text message
    async fn send_message(&self, request: &SendMessageRequest) -> Result<Message>;

    /// Send a file message referencing an earlier upload
    async fn send_file_message(
        &self,
        request: &SendMessageRequest,
        file: &UploadedFile,
    ) -> Result<Message>;

    /// Upload raw file bytes
    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile>;

    /// Acknowledge that a message reached this client
    async fn mark_delivered(&self, message_id: MessageId) -> Result<()>;

    /// Acknowledge that a message was viewed
    async fn mark_read(&self, message_id: MessageId) -> Result<()>;
}
