//! Text and file message sending

use crate::api::{ChatApi, FileUpload, SendMessageRequest};
use crate::model::{Conversation, ConversationKind, Message, MessageType};
use crate::{Error, Result};
use tracing::{info, warn};

/// Build the send envelope addressed to `conversation`
///
/// Private conversations set `receiverId` to the counterpart, groups set
/// `groupId`; the other field stays `null`.
pub fn envelope(
    conversation: &Conversation,
    content: impl Into<String>,
    message_type: MessageType,
) -> Result<SendMessageRequest> {
    let (receiver_id, group_id) = match conversation.kind {
        ConversationKind::Private => {
            let counterpart = conversation.counterpart_user_id.ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Contact {:?} is not linked to a user account",
                    conversation.name
                ))
            })?;
            (Some(counterpart), None)
        }
        ConversationKind::Group => (None, Some(conversation.id)),
    };
    Ok(SendMessageRequest::new(receiver_id, group_id, content, message_type))
}

/// Send `input` as a text message
///
/// Blank input is rejected without a request; otherwise the content is sent as typed.
pub async fn send_text(api: &dyn ChatApi, conversation: &Conversation, input: &str) -> Result<Message> {
    if input.trim().is_empty() {
        return Err(Error::InvalidInput("Message is empty".to_string()));
    }
    let request = envelope(conversation, input, MessageType::Text)?;
    let message = api.send_message(&request).await?;
    info!("Sent message {} to {}", message.id, conversation.key());
    Ok(message)
}

/// Upload `file`, then send a file message referencing it
///
/// An upload failure aborts before any send request.
pub async fn send_file(api: &dyn ChatApi, conversation: &Conversation, file: &FileUpload) -> Result<Message> {
    let request = envelope(conversation, file.file_name.clone(), MessageType::File)?;

    let uploaded = api.upload_file(file).await?;

    match api.send_file_message(&request, &uploaded).await {
        Ok(message) => {
            info!(
                "Sent file message {} ({}) to {}",
                message.id,
                file.file_name,
                conversation.key()
            );
            Ok(message)
        }
        Err(e) => {
            warn!(
                "Upload {} is orphaned: file message to {} failed: {}",
                uploaded.file_path,
                conversation.key(),
                e
            );
            Err(e)
        }
    }
}
