//! Delivered/read acknowledgements for inbound messages
//!
//! Every run scans the whole history of the active conversation. Nothing
//! remembers a high-water mark, so a run costs O(history) even when there is
//! nothing left to acknowledge.

use crate::api::ChatApi;
use crate::model::{Message, MessageId, UserId};
use crate::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Acknowledgement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckKind {
    /// `POST /messages/{id}/delivered`
    Delivered,
    /// `POST /messages/{id}/read`
    Read,
}

/// One acknowledgement to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ack {
    /// Target message
    pub message_id: MessageId,
    /// Kind
    pub kind: AckKind,
}

/// Outcome of one acknowledger run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckReport {
    /// Delivered acknowledgements accepted
    pub delivered: usize,
    /// Read acknowledgements accepted
    pub read: usize,
    /// Acknowledgements that failed
    pub failed: usize,
}

impl AckReport {
    /// Number of requests issued
    pub fn issued(&self) -> usize {
        self.delivered + self.read + self.failed
    }

    pub(crate) fn record_success(&mut self, kind: AckKind) {
        match kind {
            AckKind::Delivered => self.delivered += 1,
            AckKind::Read => self.read += 1,
        }
    }
}

/// Acknowledgements issued or in flight for the active conversation
///
/// Cleared whenever the selection changes.
#[derive(Debug, Default)]
pub struct AckLedger {
    issued: HashSet<Ack>,
}

impl AckLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the acknowledgements still owed for `messages` and record them as issued
    ///
    /// A message is owed an acknowledgement when `user_id` is on its receiving
    /// side, did not author it, and the matching server flag is still false.
    pub fn claim(&mut self, messages: &[Message], user_id: UserId) -> Vec<Ack> {
        let mut claimed = Vec::new();
        for message in messages.iter().filter(|m| m.is_inbound_for(user_id)) {
            let owed = [
                (!message.delivered).then_some(AckKind::Delivered),
                (!message.read).then_some(AckKind::Read),
            ];
            for kind in owed.into_iter().flatten() {
                let ack = Ack {
                    message_id: message.id,
                    kind,
                };
                if self.issued.insert(ack) {
                    claimed.push(ack);
                }
            }
        }
        claimed
    }

    /// Make a failed acknowledgement eligible again
    pub fn release(&mut self, ack: &Ack) {
        self.issued.remove(ack);
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.issued.clear();
    }

    /// Number of acknowledgements recorded
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Issue acknowledgements concurrently; no ordering between them
pub async fn dispatch(api: &dyn ChatApi, acks: &[Ack]) -> Vec<(Ack, Result<()>)> {
    join_all(acks.iter().map(|ack| async move {
        let result = match ack.kind {
            AckKind::Delivered => api.mark_delivered(ack.message_id).await,
            AckKind::Read => api.mark_read(ack.message_id).await,
        };
        (*ack, result)
    }))
    .await
}
