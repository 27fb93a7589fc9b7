#![cfg(feature = "inmem-store")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use async_trait::async_trait;
use chetana::chat::{
    ChatHistoryStore, ChatMessage, ChatPipeline, GeminiClient, HistoryError, InMemoryHistory, LanguageModel, ModelError,
};
use chetana::circuit_breaker::CircuitBreaker;
use chetana::configure;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::state;

const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

fn candidate(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})
}

async fn gemini_stub() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("Classify the dominant emotion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("Anxious")))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("That sounds hard. Try a slow breath with me.")))
        .mount(&server)
        .await;
    server
}

fn pipeline(server: &MockServer, history: Arc<dyn ChatHistoryStore>) -> ChatPipeline {
    ChatPipeline::new(
        Arc::new(GeminiClient::new("test-key", "gemini-test", server.uri()).unwrap()),
        history,
        CircuitBreaker::new(3, Duration::from_secs(30)),
    )
}

struct DownStore;

#[async_trait]
impl ChatHistoryStore for DownStore {
    async fn append(&self, _: &[ChatMessage]) -> Result<(), HistoryError> {
        Err(HistoryError::Unavailable("firestore timeout".into()))
    }
    async fn recent(&self, _: &str, _: usize) -> Result<Vec<ChatMessage>, HistoryError> {
        Err(HistoryError::Unavailable("firestore timeout".into()))
    }
}

#[actix_web::test]
async fn chat_classifies_replies_and_records_history() {
    let server = gemini_stub().await;
    let (_repo, state) = state();
    let state = state.with_chat(pipeline(&server, Arc::new(InMemoryHistory::default())));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"message": "Exams tomorrow and I can't sleep", "userUid": "u/abc"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["emotion"], "anxious");
    assert_eq!(body["reply"], "That sounds hard. Try a slow breath with me.");
    assert_eq!(body["historySaved"], true);

    let req = test::TestRequest::get().uri("/api/chat/history?userUid=u/abc").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["emotion"], "anxious");

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[actix_web::test]
async fn history_outage_does_not_fail_the_reply() {
    let server = gemini_stub().await;
    let (_repo, state) = state();
    let state = state.with_chat(pipeline(&server, Arc::new(DownStore)));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

    for _ in 0..4 {
        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "hello", "userUid": "u/abc"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["historySaved"], false);
    }
    let req = test::TestRequest::get().uri("/api/chat/history?userUid=u/abc").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn model_failure_is_a_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (_repo, state) = state();
    let state = state.with_chat(pipeline(&server, Arc::new(InMemoryHistory::default())));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

    let req = test::TestRequest::post().uri("/api/chat").set_json(json!({"message": "hi"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn chat_without_a_model_is_unavailable() {
    let (_repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

    let req = test::TestRequest::post().uri("/api/chat").set_json(json!({"message": "hi"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 503);
    let req = test::TestRequest::get().uri("/api/chat/history?userUid=u/abc").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 503);
}

#[tokio::test]
async fn gemini_client_reports_empty_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;
    let client = GeminiClient::new("test-key", "gemini-test", server.uri()).unwrap();
    assert!(matches!(client.generate("hello").await, Err(ModelError::Empty)));
}
