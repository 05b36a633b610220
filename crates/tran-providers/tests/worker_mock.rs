use tran_providers::TranslationWorker;
use tran_providers::openai::ChatCompletionsSource;
use tran_providers::openai::chat_completions::DEFAULT_CONNECT_TIMEOUT;
use tran_types::{
    Connector, ConsumerMessage, ErrorCode, PORT_NAME, Port, ProducerMessage, TranslationConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn translate(server: &MockServer, api_key: &str) -> ConsumerMessage {
    ConsumerMessage::Translate {
        text: "Bonjour".to_string(),
        config: TranslationConfig {
            target_language: "English".to_string(),
            prompt_template: "Translate to {{ target_language }}.".to_string(),
            max_chars: 500,
            model: "gpt-4o-mini".to_string(),
            endpoint: format!("{}/v1", server.uri()),
            api_key: api_key.to_string(),
        },
    }
}

async fn drain(port: &mut Port) -> Vec<ProducerMessage> {
    let mut out = Vec::new();
    while let Some(raw) = port.recv().await {
        out.extend(ProducerMessage::decode(&raw));
    }
    out
}

#[tokio::test]
async fn test_worker_streams_from_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(include_str!("fixtures/hello_stream.sse")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    let worker = TranslationWorker::new(source).spawn();
    let mut port = worker.connect(PORT_NAME).unwrap();
    port.sender().post(&translate(&server, "sk-test")).unwrap();

    assert_eq!(
        drain(&mut port).await,
        vec![
            ProducerMessage::chunk("Hello"),
            ProducerMessage::chunk("Hello world"),
            ProducerMessage::Complete,
        ]
    );
}

#[tokio::test]
async fn test_worker_reports_rejected_credential() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    let worker = TranslationWorker::new(source).spawn();
    let mut port = worker.connect(PORT_NAME).unwrap();
    port.sender().post(&translate(&server, "sk-revoked")).unwrap();

    let messages = drain(&mut port).await;
    assert_eq!(messages.len(), 1);
    let ProducerMessage::Error { code, .. } = &messages[0] else {
        panic!("expected error, got {messages:?}");
    };
    assert_eq!(*code, ErrorCode::InvalidApiKey);
}

#[tokio::test]
async fn test_shutdown_stops_accepting_ports() {
    let source = ChatCompletionsSource::new(DEFAULT_CONNECT_TIMEOUT).unwrap();
    let worker = TranslationWorker::new(source).spawn();
    worker.shutdown();
    tokio::task::yield_now().await;

    // The accept loop is gone, so the queued port is dropped unanswered.
    match worker.connect(PORT_NAME) {
        Ok(port) => {
            let (tx, mut rx) = port.split();
            drop(tx);
            assert_eq!(rx.recv().await, None);
        }
        Err(err) => assert_eq!(err.to_string(), "port disconnected"),
    }
}
