//! Data model
//!
//! Records served by the backend and the views derived from them:
//! - `message` - Messages, delivery status and attachment helpers
//! - `directory` - Contacts, groups and the authenticated identity
//! - `conversation` - The merged conversation list

pub mod conversation;
pub mod directory;
pub mod message;

pub use conversation::{build_conversations, Conversation, ConversationKey, ConversationKind};
pub use directory::{Contact, ContactId, CurrentUser, Group, GroupId};
pub use message::{public_path, DeliveryStatus, Message, MessageId, MessageType, UserId};
