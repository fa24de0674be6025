use crate::api::{ChatApi, FileUpload, GroupPage, SendMessageRequest, UploadedFile};
use crate::model::{Contact, CurrentUser, Group, GroupId, Message, MessageId, UserId};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A call observed by [`FakeApi`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CurrentUser,
    Contacts,
    Groups,
    PrivateHistory { user1: UserId, user2: UserId },
    GroupHistory { group_id: GroupId, page: u32, size: u32 },
    Send(SendMessageRequest),
    SendFile(SendMessageRequest, UploadedFile),
    Upload(String),
    Delivered(MessageId),
    Read(MessageId),
}

#[derive(Default)]
struct FakeState {
    me: Option<CurrentUser>,
    contacts: Vec<Contact>,
    groups: Vec<Group>,
    private: HashMap<UserId, Vec<Message>>,
    group_messages: HashMap<GroupId, Vec<Message>>,
    uploaded: UploadedFile,
    failures: HashMap<&'static str, (u16, String)>,
    calls: Vec<Call>,
    next_id: MessageId,
}

/// In-memory backend
///
/// Group history is paged newest first like the real server. Operations can
/// be made to fail by name, and group history can be held until released.
pub struct FakeApi {
    state: Mutex<FakeState>,
    gates: Mutex<HashMap<GroupId, Arc<Notify>>>,
}

impl FakeApi {
    pub fn new(me: UserId) -> Self {
        Self {
            state: Mutex::new(FakeState {
                me: Some(CurrentUser {
                    id: me,
                    username: format!("user{}", me),
                    email: None,
                }),
                uploaded: UploadedFile {
                    file_path: "./uploads/file.bin".to_string(),
                    mime_type: Some("application/octet-stream".to_string()),
                    file_size: Some("3".to_string()),
                    ..UploadedFile::default()
                },
                next_id: 1000,
                ..FakeState::default()
            }),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_contacts(self, contacts: Vec<Contact>) -> Self {
        self.state.lock().unwrap().contacts = contacts;
        self
    }

    pub fn with_groups(self, groups: Vec<Group>) -> Self {
        self.state.lock().unwrap().groups = groups;
        self
    }

    /// Messages exchanged with `counterpart`, oldest first
    pub fn with_private(self, counterpart: UserId, messages: Vec<Message>) -> Self {
        self.state.lock().unwrap().private.insert(counterpart, messages);
        self
    }

    /// Messages of `group_id`, oldest first
    pub fn with_group_messages(self, group_id: GroupId, messages: Vec<Message>) -> Self {
        self.state
            .lock()
            .unwrap()
            .group_messages
            .insert(group_id, messages);
        self
    }

    pub fn with_upload_result(self, uploaded: UploadedFile) -> Self {
        self.state.lock().unwrap().uploaded = uploaded;
        self
    }

    /// Make `operation` fail with `status` until [`FakeApi::heal`]; status 0 means no response
    pub fn fail(&self, operation: &'static str, status: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, (status, message.to_string()));
    }

    pub fn heal(&self, operation: &'static str) {
        self.state.lock().unwrap().failures.remove(operation);
    }

    /// Hold the next group history request for `group_id` until the returned handle is notified
    pub fn gate_group(&self, group_id: GroupId) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(group_id, notify.clone());
        notify
    }

    pub fn set_group_messages(&self, group_id: GroupId, messages: Vec<Message>) {
        self.state
            .lock()
            .unwrap()
            .group_messages
            .insert(group_id, messages);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.failures.get(operation) {
            None => Ok(()),
            Some((status, message)) => Err(match *status {
                0 => Error::Network(message.clone()),
                401 | 403 => Error::AuthExpired { status: *status },
                status => Error::ServerRejected {
                    status,
                    message: message.clone(),
                },
            }),
        }
    }

    fn store_sent(&self, request: &SendMessageRequest, file: Option<&UploadedFile>) -> Message {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let sender = state.me.as_ref().map(|u| u.id).unwrap_or_default();
        let mut message = Message::text(state.next_id, sender, request.content.clone());
        message.message_type = request.message_type;
        message.receiver_id = request.receiver_id;
        message.group_id = request.group_id;
        if let Some(file) = file {
            message.file_path = Some(file.file_path.clone());
            message.mime_type = file.mime_type.clone();
            message.thumbnail_path = file.thumbnail_path.clone();
        }
        match (request.receiver_id, request.group_id) {
            (Some(receiver), _) => state.private.entry(receiver).or_default().push(message.clone()),
            (None, Some(group)) => state
                .group_messages
                .entry(group)
                .or_default()
                .push(message.clone()),
            (None, None) => {}
        }
        message
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn current_user(&self) -> Result<CurrentUser> {
        self.record(Call::CurrentUser, "current_user")?;
        self.state
            .lock()
            .unwrap()
            .me
            .clone()
            .ok_or(Error::AuthExpired { status: 401 })
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.record(Call::Contacts, "contacts")?;
        Ok(self.state.lock().unwrap().contacts.clone())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        self.record(Call::Groups, "groups")?;
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn private_history(&self, user1: UserId, user2: UserId) -> Result<Vec<Message>> {
        self.record(Call::PrivateHistory { user1, user2 }, "private_history")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .private
            .get(&user2)
            .cloned()
            .unwrap_or_default())
    }

    async fn group_history(&self, group_id: GroupId, page: u32, size: u32) -> Result<GroupPage> {
        let recorded = self.record(Call::GroupHistory { group_id, page, size }, "group_history");

        let gate = self.gates.lock().unwrap().remove(&group_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        recorded?;

        let state = self.state.lock().unwrap();
        let mut newest_first = state.group_messages.get(&group_id).cloned().unwrap_or_default();
        newest_first.reverse();
        let start = (page * size) as usize;
        let content: Vec<Message> = newest_first
            .iter()
            .skip(start)
            .take(size as usize)
            .cloned()
            .collect();
        let last = start + size as usize >= newest_first.len();
        Ok(GroupPage {
            content,
            last,
            total_pages: None,
            total_elements: Some(newest_first.len() as u64),
            number: Some(page),
        })
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Message> {
        self.record(Call::Send(request.clone()), "send_message")?;
        Ok(self.store_sent(request, None))
    }

    async fn send_file_message(
        &self,
        request: &SendMessageRequest,
        file: &UploadedFile,
    ) -> Result<Message> {
        self.record(Call::SendFile(request.clone(), file.clone()), "send_file_message")?;
        Ok(self.store_sent(request, Some(file)))
    }

    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile> {
        self.record(Call::Upload(file.file_name.clone()), "upload_file")?;
        Ok(self.state.lock().unwrap().uploaded.clone())
    }

    async fn mark_delivered(&self, message_id: MessageId) -> Result<()> {
        self.record(Call::Delivered(message_id), "mark_delivered")
    }

    async fn mark_read(&self, message_id: MessageId) -> Result<()> {
        self.record(Call::Read(message_id), "mark_read")
    }
}
