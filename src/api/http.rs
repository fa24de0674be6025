//! REST client for the chat backend

use crate::api::wire::{
    error_message, ContactsResponse, FileUpload, GroupPage, GroupsResponse, SendMessageRequest,
    SendMessageResponse, UploadedFile,
};
use crate::api::ChatApi;
use crate::config::{ClientConfig, FileMetaEncoding};
use crate::model::{Contact, CurrentUser, Group, GroupId, Message, MessageId, UserId};
use crate::session::SessionProvider;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// [`ChatApi`] over HTTP(S)
///
/// Attaches `Authorization: Bearer <token>` from the injected session to
/// every call, and clears that session when the backend answers 401/403.
///
/// # Example
/// ```rust,no_run
/// use chat_sync::api::{ChatApi, HttpChatApi};
/// use chat_sync::config::ClientConfig;
/// use chat_sync::session::MemorySession;
/// use std::sync::Arc;
///
/// # async fn example() -> chat_sync::Result<()> {
/// let session = Arc::new(MemorySession::with_token("eyJhbGciOi..."));
/// let api = HttpChatApi::new(&ClientConfig::default(), session)?;
///
/// let me = api.current_user().await?;
/// println!("Logged in as {} ({})", me.username, me.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    file_meta_encoding: FileMetaEncoding,
}

impl HttpChatApi {
    /// Create a client from configuration and a session provider
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            file_meta_encoding: config.file_meta_encoding,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and classify the outcome
    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            error!("Request to backend failed: {}", e);
            Error::Network(e.to_string())
        })?;

        let status = response.status();
        debug!("{} -> {}", response.url().path(), status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Backend rejected the session with status {}", status);
            if let Err(e) = self.session.clear() {
                warn!("Failed to clear session: {}", e);
            }
            return Err(Error::AuthExpired {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body, status.canonical_reason().unwrap_or("request failed"));
            warn!("Backend rejected request with status {}: {}", status, message);
            return Err(Error::ServerRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.dispatch(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(format!("Failed to decode response: {}", e)))
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn current_user(&self) -> Result<CurrentUser> {
        self.fetch_json(self.request(Method::GET, "/test/me")).await
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        let body: ContactsResponse = self.fetch_json(self.request(Method::GET, "/contacts")).await?;
        Ok(body.contacts)
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        let body: GroupsResponse = self.fetch_json(self.request(Method::GET, "/groups")).await?;
        Ok(body.groups)
    }

    async fn private_history(&self, user1: UserId, user2: UserId) -> Result<Vec<Message>> {
        let builder = self
            .request(Method::GET, "/messages/between")
            .query(&[("user1", user1), ("user2", user2)]);
        self.fetch_json(builder).await
    }

    async fn group_history(&self, group_id: GroupId, page: u32, size: u32) -> Result<GroupPage> {
        let builder = self
            .request(Method::GET, &format!("/messages/group/{}/paged", group_id))
            .query(&[("page", page), ("size", size)]);
        self.fetch_json(builder).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Message> {
        let body: SendMessageResponse = self
            .fetch_json(self.request(Method::POST, "/messages").json(request))
            .await?;
        info!("Message {} accepted by backend", body.data.id);
        Ok(body.data)
    }

    async fn send_file_message(
        &self,
        request: &SendMessageRequest,
        file: &UploadedFile,
    ) -> Result<Message> {
        let builder = match self.file_meta_encoding {
            FileMetaEncoding::Delimited => self
                .request(Method::POST, "/messages/send-file")
                .query(&[("fileMeta", file.to_delimited())])
                .json(request),
            FileMetaEncoding::Structured => self
                .request(Method::POST, "/messages")
                .json(&request.clone().with_file_fields(file)),
        };
        let body: SendMessageResponse = self.fetch_json(builder).await?;
        info!("File message {} accepted by backend", body.data.id);
        Ok(body.data)
    }

    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(mime) = &file.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|e| Error::InvalidInput(format!("Invalid MIME type {:?}: {}", mime, e)))?;
        }
        let form = Form::new().part("file", part);

        let response = self
            .dispatch(self.request(Method::POST, "/messages/upload").multipart(form))
            .await?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("Failed to decode upload response: {}", e)))?;

        // The upload endpoint may report failures in the body of a 2xx response
        if let Some(Value::String(message)) = body.get("error") {
            warn!("Upload of {} rejected: {}", file.file_name, message);
            return Err(Error::ServerRejected {
                status: status.as_u16(),
                message: message.clone(),
            });
        }

        let uploaded: UploadedFile = serde_json::from_value(body)
            .map_err(|e| Error::Decode(format!("Failed to decode upload metadata: {}", e)))?;
        info!("Uploaded {} to {}", file.file_name, uploaded.file_path);
        Ok(uploaded)
    }

    async fn mark_delivered(&self, message_id: MessageId) -> Result<()> {
        self.dispatch(self.request(Method::POST, &format!("/messages/{}/delivered", message_id)))
            .await?;
        Ok(())
    }

    async fn mark_read(&self, message_id: MessageId) -> Result<()> {
        self.dispatch(self.request(Method::POST, &format!("/messages/{}/read", message_id)))
            .await?;
        Ok(())
    }
}
