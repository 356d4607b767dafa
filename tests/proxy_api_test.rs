use std::sync::{ Arc, Mutex };

use axum::body::Body;
use axum::http::{ Request, StatusCode };
use serde_json::{ json, Value };
use tower::ServiceExt;

use pocket_chat::llm::chat::{ ChatClient, CompletionResponse };
use pocket_chat::llm::LlmError;
use pocket_chat::models::chat::{ ChatTurn, Role };
use pocket_chat::server::{ router, AppState };

#[derive(Default)]
struct MockChatClient {
    fail: bool,
    calls: Mutex<Vec<Vec<ChatTurn>>>,
}

#[async_trait::async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(turns.to_vec());
        if self.fail {
            return Err(LlmError::InvalidResponse("upstream exploded".into()));
        }
        Ok(CompletionResponse { response: "Hi there".to_string() })
    }

    fn get_model(&self) -> String {
        "mock".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

fn app(client: Arc<MockChatClient>) -> axum::Router {
    router(AppState::new(client))
}

fn post_chat(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn given_health_request_then_returns_ok_true() {
    let response = app(Arc::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn given_valid_turns_when_posting_chat_then_returns_upstream_text() {
    let client = Arc::new(MockChatClient::default());

    let response = app(client.clone())
        .oneshot(post_chat(json!({ "messages": [{ "role": "user", "content": "Hello" }] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "text": "Hi there" }));
    assert_eq!(*client.calls.lock().unwrap(), vec![vec![ChatTurn::new(Role::User, "Hello")]]);
}

#[tokio::test]
async fn given_forty_turns_when_posting_chat_then_only_last_thirty_are_forwarded() {
    let client = Arc::new(MockChatClient::default());
    let messages: Vec<Value> = (0..40)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            json!({ "role": role, "content": format!("turn {}", i) })
        })
        .collect();

    let response = app(client.clone())
        .oneshot(post_chat(json!({ "messages": messages })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = client.calls.lock().unwrap();
    assert_eq!(calls[0].len(), 30);
    assert_eq!(calls[0][0].content, "turn 10");
    assert_eq!(calls[0][29].content, "turn 39");
}

#[tokio::test]
async fn given_no_usable_turns_when_posting_chat_then_returns_400() {
    for body in [
        json!({}),
        json!({ "messages": [] }),
        json!({ "messages": [{ "role": "system", "content": "x" }] }),
        json!({ "messages": "Hello" }),
    ] {
        let client = Arc::new(MockChatClient::default());
        let response = app(client.clone()).oneshot(post_chat(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({ "error": "messages is required" }));
        assert!(client.calls.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn given_body_without_json_content_type_when_posting_chat_then_returns_400() {
    for (content_type, body) in [
        (None, ""),
        (Some("text/plain"), "Hello"),
        (Some("application/json"), "{not json"),
    ] {
        let client = Arc::new(MockChatClient::default());
        let mut request = Request::builder().method("POST").uri("/chat");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        let response = app(client.clone())
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(read_json(response).await, json!({ "error": "messages is required" }));
        assert!(client.calls.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn given_valid_turns_without_content_type_when_posting_chat_then_returns_text() {
    let body = json!({ "messages": [{ "role": "user", "content": "Hello" }] }).to_string();
    let request = Request::builder().method("POST").uri("/chat").body(Body::from(body)).unwrap();

    let response = app(Arc::default()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "text": "Hi there" }));
}

#[tokio::test]
async fn given_upstream_failure_when_posting_chat_then_returns_500_server_error() {
    let client = Arc::new(MockChatClient { fail: true, ..MockChatClient::default() });

    let response = app(client)
        .oneshot(post_chat(json!({ "messages": [{ "role": "user", "content": "Hello" }] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await, json!({ "error": "server_error" }));
}

#[tokio::test]
async fn given_custom_turn_cap_when_posting_chat_then_cap_is_applied() {
    let client = Arc::new(MockChatClient::default());
    let state = AppState { chat_client: client.clone(), max_turns: 2 };
    let messages: Vec<Value> = (0..5)
        .map(|i| json!({ "role": "user", "content": format!("m{}", i) }))
        .collect();

    router(state).oneshot(post_chat(json!({ "messages": messages }))).await.unwrap();

    let calls = client.calls.lock().unwrap();
    assert_eq!(calls[0], vec![ChatTurn::new(Role::User, "m3"), ChatTurn::new(Role::User, "m4")]);
}

#[tokio::test]
async fn given_oversized_body_when_posting_chat_then_request_is_rejected() {
    let client = Arc::new(MockChatClient::default());
    let huge = "x".repeat(2 * 1024 * 1024);

    let response = app(client.clone())
        .oneshot(post_chat(json!({ "messages": [{ "role": "user", "content": huge }] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(client.calls.lock().unwrap().is_empty());
}
