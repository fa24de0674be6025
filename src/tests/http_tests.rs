use super::support::MockBackend;
use crate::api::*;
use crate::config::{ClientConfig, FileMetaEncoding};
use crate::model::{ConversationKey, MessageType};
use crate::session::{MemorySession, SessionProvider};
use crate::sync::{ConversationSync, LoadOutcome, SyncOptions};
use crate::Error;
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

const TOKEN: &str = "test-token";

fn config(mock: &MockBackend, encoding: FileMetaEncoding) -> ClientConfig {
    ClientConfig {
        base_url: mock.base_url(),
        file_meta_encoding: encoding,
        system_proxy: false,
        ..ClientConfig::default()
    }
}

fn client(mock: &MockBackend, session: Arc<MemorySession>) -> HttpChatApi {
    HttpChatApi::new(&config(mock, FileMetaEncoding::Delimited), session)
        .expect("Failed to create client")
}

fn signed_in() -> Arc<MemorySession> {
    Arc::new(MemorySession::with_token(TOKEN))
}

fn sent(id: i64) -> serde_json::Value {
    json!({
        "message": "Message sent",
        "data": {"id": id, "senderId": 3, "receiverId": 42, "content": "hello", "type": "text"}
    })
}

fn uploaded() -> UploadedFile {
    UploadedFile {
        file_path: "./uploads/a.txt".to_string(),
        mime_type: Some("text/plain".to_string()),
        file_size: Some("3".to_string()),
        ..UploadedFile::default()
    }
}

// Undo the query encoding for the characters file metadata uses
fn decode_query(query: &str) -> String {
    query.replace("%7C", "|").replace("%2F", "/")
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let mock = MockBackend::start().await;
    mock.route("GET", "/test/me", 200, json!({"id": 3, "username": "me", "email": "me@x.io"}));
    let api = client(&mock, signed_in());

    let me = assert_ok!(api.current_user().await);

    assert_eq!(me.id, 3);
    assert_eq!(me.email.as_deref(), Some("me@x.io"));
    let requests = mock.requests_to("/test/me");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-token"));
}

#[tokio::test]
async fn test_no_token_no_header() {
    let mock = MockBackend::start().await;
    mock.route("GET", "/contacts", 200, json!({"contacts": []}));
    let api = client(&mock, Arc::new(MemorySession::new()));

    assert_ok!(api.contacts().await);
    assert_eq!(mock.requests()[0].authorization, None);
}

#[tokio::test]
async fn test_directory_envelopes_unwrapped() {
    let mock = MockBackend::start().await;
    mock.route(
        "GET",
        "/contacts",
        200,
        json!({"contacts": [{"id": 1, "contactUserId": 42, "username": "alice"}, {"id": 2, "alias": "Plumber"}]}),
    );
    mock.route("GET", "/groups", 200, json!({"groups": [{"id": 7, "name": "Team", "members": [3, 42]}]}));
    let api = client(&mock, signed_in());

    let contacts = assert_ok!(api.contacts().await);
    let groups = assert_ok!(api.groups().await);

    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[0].contact_user_id, Some(42));
    assert_eq!(contacts[1].contact_user_id, None);
    assert_eq!(groups[0].name, "Team");
}

#[tokio::test]
async fn test_private_history_query() {
    let mock = MockBackend::start().await;
    mock.route(
        "GET",
        "/messages/between",
        200,
        json!([{"id": 1, "senderId": 42, "receiverId": 3, "content": "hi", "type": "text", "delivered": true}]),
    );
    let api = client(&mock, signed_in());

    let messages = assert_ok!(api.private_history(3, 42).await);

    assert_eq!(messages.len(), 1);
    assert!(messages[0].delivered);
    assert_eq!(
        mock.requests_to("/messages/between")[0].query.as_deref(),
        Some("user1=3&user2=42")
    );
}

#[tokio::test]
async fn test_group_history_path_and_query() {
    let mock = MockBackend::start().await;
    mock.route(
        "GET",
        "/messages/group/7/paged",
        200,
        json!({
            "content": [
                {"id": 9, "senderId": 42, "groupId": 7, "content": "new", "type": "text", "senderUsername": "alice"},
                {"id": 8, "senderId": 3, "groupId": 7, "content": "old", "type": "text"}
            ],
            "last": false,
            "totalPages": 4,
            "number": 1
        }),
    );
    let api = client(&mock, signed_in());

    let page = assert_ok!(api.group_history(7, 1, 20).await);

    assert_eq!(page.content.len(), 2);
    assert!(page.has_more());
    assert_eq!(page.number, Some(1));
    assert_eq!(
        mock.requests_to("/messages/group/7/paged")[0].query.as_deref(),
        Some("page=1&size=20")
    );
}

#[tokio::test]
async fn test_text_message_body() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages", 200, sent(77));
    let api = client(&mock, signed_in());

    let request = SendMessageRequest::new(Some(42), None, "hello", MessageType::Text);
    let message = assert_ok!(api.send_message(&request).await);

    assert_eq!(message.id, 77);
    let recorded = &mock.requests_to("/messages")[0];
    assert_eq!(recorded.method, "POST");
    assert_eq!(
        recorded.body_text(),
        r#"{"receiverId":42,"groupId":null,"content":"hello","type":"text"}"#
    );
    assert!(recorded
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("application/json")));
}

#[tokio::test]
async fn test_delimited_file_message() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages/send-file", 200, sent(78));
    let api = client(&mock, signed_in());

    let request = SendMessageRequest::new(None, Some(7), "a.txt", MessageType::File);
    assert_ok!(api.send_file_message(&request, &uploaded()).await);

    let recorded = &mock.requests_to("/messages/send-file")[0];
    let query = recorded.query.as_deref().expect("Missing fileMeta query");
    assert_eq!(decode_query(query), "fileMeta=./uploads/a.txt|text/plain|3||||");
    assert_eq!(
        recorded.json(),
        json!({"receiverId": null, "groupId": 7, "content": "a.txt", "type": "file"})
    );
    assert!(mock.requests_to("/messages").is_empty());
}

#[tokio::test]
async fn test_structured_file_message() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages", 200, sent(79));
    let api = HttpChatApi::new(&config(&mock, FileMetaEncoding::Structured), signed_in())
        .expect("Failed to create client");

    let request = SendMessageRequest::new(None, Some(7), "a.txt", MessageType::File);
    assert_ok!(api.send_file_message(&request, &uploaded()).await);

    let recorded = &mock.requests_to("/messages")[0];
    assert_eq!(recorded.query, None);
    let body = recorded.json();
    assert_eq!(body["filePath"], json!("./uploads/a.txt"));
    assert_eq!(body["mimeType"], json!("text/plain"));
    assert_eq!(body["fileSize"], json!(3));
    assert_eq!(body["type"], json!("file"));
}

#[tokio::test]
async fn test_upload_is_multipart() {
    let mock = MockBackend::start().await;
    mock.route(
        "POST",
        "/messages/upload",
        200,
        json!({"filePath": "./uploads/a.txt", "mimeType": "text/plain", "fileSize": "3"}),
    );
    let api = client(&mock, signed_in());

    let upload = FileUpload::new("a.txt", b"abc".to_vec()).with_mime_type("text/plain");
    let result = assert_ok!(api.upload_file(&upload).await);

    assert_eq!(result, uploaded());
    let recorded = &mock.requests_to("/messages/upload")[0];
    assert!(recorded
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data")));
    let body = recorded.body_text();
    assert!(body.contains(r#"name="file""#));
    assert!(body.contains(r#"filename="a.txt""#));
    assert!(body.contains("abc"));
}

#[tokio::test]
async fn test_upload_rejected_with_status() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages/upload", 400, json!({"error": "too large"}));
    let api = client(&mock, signed_in());

    let err = assert_err!(api.upload_file(&FileUpload::new("big.iso", vec![0; 32])).await);

    assert_eq!(err.to_string(), "too large");
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_upload_error_in_success_body() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages/upload", 200, json!({"error": "Unsupported file type"}));
    let api = client(&mock, signed_in());

    let err = assert_err!(api.upload_file(&FileUpload::new("x.exe", vec![1])).await);

    assert!(matches!(err, Error::ServerRejected { status: 200, .. }));
    assert_eq!(err.to_string(), "Unsupported file type");
}

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let mock = MockBackend::start().await;
    mock.route("GET", "/contacts", 401, json!({"error": "expired"}));
    let session = signed_in();
    let api = client(&mock, session.clone());

    let err = assert_err!(api.contacts().await);

    assert!(matches!(err, Error::AuthExpired { status: 401 }));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_forbidden_clears_session() {
    let mock = MockBackend::start().await;
    mock.route("GET", "/groups", 403, json!({}));
    let session = signed_in();
    let api = client(&mock, session.clone());

    let err = assert_err!(api.groups().await);

    assert!(err.is_auth_expired());
    assert_eq!(session.token(), None);
}

#[tokio::test]
async fn test_server_error_keeps_session() {
    let mock = MockBackend::start().await;
    mock.route_raw("POST", "/messages", 500, "database unavailable");
    let session = signed_in();
    let api = client(&mock, session.clone());

    let request = SendMessageRequest::new(Some(42), None, "hello", MessageType::Text);
    let err = assert_err!(api.send_message(&request).await);

    assert!(matches!(err, Error::ServerRejected { status: 500, .. }));
    assert_eq!(err.to_string(), "database unavailable");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mock = MockBackend::start().await;
    mock.route_raw("GET", "/test/me", 200, "<html>login</html>");
    let api = client(&mock, signed_in());

    let err = assert_err!(api.current_user().await);
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("Failed to reserve port");
    let config = ClientConfig {
        base_url: format!("http://{}", addr),
        system_proxy: false,
        ..ClientConfig::default()
    };
    let api = HttpChatApi::new(&config, signed_in()).expect("Failed to create client");

    let err = assert_err!(api.current_user().await);
    assert!(matches!(err, Error::Network(_)));
}

#[tokio::test]
async fn test_acknowledgement_paths() {
    let mock = MockBackend::start().await;
    mock.route("POST", "/messages/5/delivered", 200, json!({}));
    mock.route("POST", "/messages/5/read", 200, json!({}));
    let api = client(&mock, signed_in());

    assert_ok!(api.mark_delivered(5).await);
    assert_ok!(api.mark_read(5).await);

    let paths: Vec<String> = mock.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/messages/5/delivered", "/messages/5/read"]);
    assert!(mock.requests().iter().all(|r| r.method == "POST"));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = ClientConfig {
        base_url: "localhost".to_string(),
        ..ClientConfig::default()
    };
    assert!(HttpChatApi::new(&config, signed_in()).is_err());
}

#[tokio::test]
async fn test_sync_over_http() {
    let mock = MockBackend::start().await;
    mock.route("GET", "/test/me", 200, json!({"id": 3, "username": "me"}));
    mock.route("GET", "/contacts", 200, json!({"contacts": []}));
    mock.route("GET", "/groups", 200, json!({"groups": [{"id": 7, "name": "Team"}]}));
    mock.route(
        "GET",
        "/messages/group/7/paged",
        200,
        json!({
            "content": [
                {"id": 2, "senderId": 42, "groupId": 7, "content": "second", "type": "text", "sentAt": "2024-03-01T12:01:00"},
                {"id": 1, "senderId": 42, "groupId": 7, "content": "first", "type": "text", "sentAt": "2024-03-01T12:00:00"}
            ],
            "last": true
        }),
    );
    let api = Arc::new(client(&mock, signed_in()));
    let sync = ConversationSync::new(
        api,
        SyncOptions {
            group_page_size: 20,
            auto_acknowledge: false,
        },
    );

    assert_ok!(sync.mount().await);
    let outcome = assert_ok!(sync.select(ConversationKey::group(7)).await);

    assert_eq!(outcome, LoadOutcome::Applied { received: 2, has_more: false });
    let contents: Vec<String> = sync.messages().await.into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["first", "second"]);

    let report = assert_ok!(sync.acknowledge().await);
    assert_eq!(report.failed, 4, "Acknowledgement routes are not mounted");
    assert_eq!(mock.requests_to("/messages/1/delivered").len(), 1);
}
