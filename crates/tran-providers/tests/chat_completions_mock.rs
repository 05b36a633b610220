use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tran_providers::openai::ChatCompletionsSource;
use tran_providers::openai::chat_completions::DEFAULT_CONNECT_TIMEOUT;
use tran_providers::{ProviderErrorKind, ProviderResult, TranslationRequest, TranslationSource};
use tran_types::{ErrorCode, TranslationConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_STREAM: &str = include_str!("fixtures/hello_stream.sse");
const MIDSTREAM_ERROR: &str = include_str!("fixtures/midstream_error.sse");

fn request(server: &MockServer, api_key: &str) -> TranslationRequest {
    TranslationRequest {
        text: "你好世界".to_string(),
        config: TranslationConfig {
            target_language: "English".to_string(),
            prompt_template: "Translate the following text to {{ target_language }}.".to_string(),
            max_chars: 500,
            model: "gpt-4o-mini".to_string(),
            endpoint: format!("{}/v1", server.uri()),
            api_key: api_key.to_string(),
        },
    }
}

fn sse(body: &'static str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

async fn run(server: &MockServer, api_key: &str) -> Vec<ProviderResult<String>> {
    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    source
        .translate(request(server, api_key), CancellationToken::new())
        .collect()
        .await
}

#[tokio::test]
async fn test_streams_accumulated_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "messages": [
                {"role": "system", "content": "Translate the following text to English."},
                {"role": "user", "content": "你好世界"}
            ]
        })))
        .respond_with(sse(HELLO_STREAM))
        .expect(1)
        .mount(&server)
        .await;

    let items: Vec<String> = run(&server, "sk-test")
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(items, vec!["Hello", "Hello world"]);
}

#[tokio::test]
async fn test_unauthorized_is_invalid_api_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let items = run(&server, "sk-wrong").await;
    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Auth);
    assert_eq!(err.code(), ErrorCode::InvalidApiKey);
    assert_eq!(err.details.as_deref(), Some("Incorrect API key provided"));
}

#[tokio::test]
async fn test_server_error_is_unknown_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let items = run(&server, "sk-test").await;
    let err = items[0].as_ref().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);
    assert_eq!(err.message, "API request failed (503)");
}

#[tokio::test]
async fn test_midstream_error_ends_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(MIDSTREAM_ERROR))
        .mount(&server)
        .await;

    let items = run(&server, "sk-test").await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().ok(), Some("Hal"));
    assert_eq!(
        items[1].as_ref().unwrap_err().kind,
        ProviderErrorKind::ApiError
    );
}

#[tokio::test]
async fn test_missing_credential_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(sse(HELLO_STREAM))
        .expect(0)
        .mount(&server)
        .await;

    let items = run(&server, "   ").await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), ErrorCode::NoApiKey);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network() {
    let server = MockServer::start().await;
    let mut req = request(&server, "sk-test");
    // Nothing listens on port 9 locally.
    req.config.endpoint = "http://127.0.0.1:9/v1".to_string();

    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    let items: Vec<_> = source
        .translate(req, CancellationToken::new())
        .collect()
        .await;
    assert_eq!(items[0].as_ref().unwrap_err().code(), ErrorCode::Network);
}

#[tokio::test]
async fn test_cancelled_before_poll_yields_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(sse(HELLO_STREAM))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    let items: Vec<_> = source
        .translate(request(&server, "sk-test"), cancel)
        .collect()
        .await;
    assert!(items.is_empty());
}
