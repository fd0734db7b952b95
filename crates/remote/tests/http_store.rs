use std::time::Duration;

use palaver_remote::{
    AuthService, Credentials, DEFAULT_REQUEST_TIMEOUT, HttpRemoteStore, RemoteError,
    RemoteErrorKind, RemoteStore, Sender, ThreadId, UserId,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> HttpRemoteStore {
    HttpRemoteStore::new(&format!("{}/api", server.uri()), DEFAULT_REQUEST_TIMEOUT)
        .expect("http store")
}

fn user() -> UserId {
    UserId::parse("u-42").expect("user id")
}

fn thread(raw: &str) -> ThreadId {
    ThreadId::parse(raw).expect("thread id")
}

#[tokio::test]
async fn list_threads_decodes_naive_timestamps_in_server_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_chats/u-42"))
        .and(header("User-ID", "u-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"chat_id": "c-1", "title": "Greeting", "created_at": "2024-05-01T12:00:00.000001"},
            {"chat_id": "c-2", "title": "Trip planning", "created_at": "2024-05-02T08:15:00"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let threads = store_for(&server)
        .list_threads(&user())
        .await
        .expect("list threads");

    let titles = threads
        .iter()
        .map(|record| (record.thread_id.as_str(), record.title.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(titles, vec![("c-1", "Greeting"), ("c-2", "Trip planning")]);
    assert!(threads[0].created_at < threads[1].created_at);
}

#[tokio::test]
async fn create_thread_posts_title_and_returns_server_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/new_chat"))
        .and(body_json(json!({"user_id": "u-42", "title": "Trip planning"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "New chat created", "chat_id": "c-9"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = store_for(&server)
        .create_thread(&user(), "Trip planning")
        .await
        .expect("create thread");

    assert_eq!(created, thread("c-9"));
}

#[tokio::test]
async fn transcript_maps_bot_sender_to_assistant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/u-42/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"sender": "user", "message": "Hello", "timestamp": "2024-05-01T12:00:00"},
            {"sender": "bot", "message": "Hi there!", "timestamp": "2024-05-01T12:00:01"}
        ])))
        .mount(&server)
        .await;

    let transcript = store_for(&server)
        .get_transcript(&user(), &thread("c-1"))
        .await
        .expect("transcript");

    let entries = transcript
        .iter()
        .map(|entry| (entry.sender, entry.body.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        entries,
        vec![(Sender::User, "Hello"), (Sender::Assistant, "Hi there!")]
    );
}

#[tokio::test]
async fn send_message_forwards_untrimmed_body_and_returns_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send_message"))
        .and(body_json(
            json!({"user_id": "u-42", "chat_id": "c-1", "message": " Hello \n"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Hi there!"})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = store_for(&server)
        .send_message(&user(), &thread("c-1"), " Hello \n")
        .await
        .expect("send message");

    assert_eq!(reply, "Hi there!");
}

#[tokio::test]
async fn rename_and_delete_use_thread_scoped_routes() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/chat/u-42/c-1/rename"))
        .and(body_json(json!({"new_title": "Intro"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Chat title updated"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/u-42/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Chat deleted successfully"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store
        .rename_thread(&user(), &thread("c-1"), "Intro")
        .await
        .expect("rename");
    store
        .delete_thread(&user(), &thread("c-1"))
        .await
        .expect("delete");
}

#[tokio::test]
async fn missing_thread_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/u-42/gone"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"detail": "Chat not found or already deleted"})),
        )
        .mount(&server)
        .await;

    let error = store_for(&server)
        .delete_thread(&user(), &thread("gone"))
        .await
        .expect_err("delete should fail");

    assert_eq!(error.kind(), RemoteErrorKind::NotFound);
    assert!(matches!(error, RemoteError::NotFound { ref id, .. } if id == "gone"));
}

#[tokio::test]
async fn server_errors_are_unavailable_and_keep_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send_message"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"detail": "AI service unavailable"})),
        )
        .mount(&server)
        .await;

    let error = store_for(&server)
        .send_message(&user(), &thread("c-1"), "Hello")
        .await
        .expect_err("send should fail");

    assert_eq!(error.kind(), RemoteErrorKind::Unavailable);
    assert!(error.to_string().contains("AI service unavailable"));
}

#[tokio::test]
async fn unauthorized_status_is_classified_separately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_chats/u-42"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .mount(&server)
        .await;

    let error = store_for(&server)
        .list_threads(&user())
        .await
        .expect_err("list should fail");

    assert_eq!(error.kind(), RemoteErrorKind::Unauthorized);
}

#[tokio::test]
async fn slow_responses_surface_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send_message"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "too late"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(&format!("{}/api", server.uri()), Duration::from_millis(50))
        .expect("http store");
    let error = store
        .send_message(&user(), &thread("c-1"), "Hello")
        .await
        .expect_err("send should time out");

    assert_eq!(error.kind(), RemoteErrorKind::Timeout);
}

#[tokio::test]
async fn malformed_bodies_are_decode_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/new_chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let error = store_for(&server)
        .create_thread(&user(), "Greeting")
        .await
        .expect_err("create should fail");

    assert!(matches!(error, RemoteError::Decode { .. }));
    assert_eq!(error.kind(), RemoteErrorKind::Unavailable);
}

#[tokio::test]
async fn login_returns_account_without_user_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"username": "ada", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"user_id": "u-42", "username": "ada"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let account = store_for(&server)
        .login(&Credentials::new("ada", "secret"))
        .await
        .expect("login");

    assert_eq!(account.user_id, user());
    assert_eq!(account.username, "ada");
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|request| !request.headers.contains_key("User-ID")));
}
