//! OpenAI-compatible Chat Completions translation source.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::future::ready;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tran_types::sanitize_for_log;

use crate::prompt::render_system_prompt;
use crate::shared::{
    ProviderError, ProviderErrorKind, ProviderResult, USER_AGENT, classify_reqwest_error,
};
use crate::source::{TranslationRequest, TranslationSource, TranslationStream, accumulate};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Default connect timeout for new connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Boxed stream of raw text deltas.
pub type DeltaStream = BoxStream<'static, ProviderResult<String>>;

/// Streams translations from any `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsSource {
    http: reqwest::Client,
}

impl ChatCompletionsSource {
    /// Creates a source with the given connect timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(connect_timeout: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                ProviderError::new(
                    ProviderErrorKind::Network,
                    format!("Failed to build HTTP client: {e}"),
                )
            })?;
        Ok(Self { http })
    }

    /// Opens the SSE stream and returns raw text deltas.
    ///
    /// # Errors
    /// Returns a classified error if the credential is missing, the request
    /// fails, or the endpoint answers with a non-success status.
    pub async fn send_stream(&self, request: &TranslationRequest) -> ProviderResult<DeltaStream> {
        let config = &request.config;
        if !config.has_credential() {
            return Err(ProviderError::missing_credential());
        }

        let system = match render_system_prompt(&config.prompt_template, &config.target_language)
        {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!("Failed to render prompt template: {error}; sending it verbatim");
                config.prompt_template.clone()
            }
        };
        let body = ChatCompletionRequest::new(&config.model, &system, &request.text);
        if let Ok(value) = serde_json::to_value(&body) {
            debug!(payload = %sanitize_for_log(&value), "chat completions request");
        }

        let url = format!(
            "{}{}",
            config.endpoint.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        );
        let response = self
            .http
            .post(&url)
            .headers(build_headers(config.api_key.trim()))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body));
        }

        Ok(ChatCompletionsSseParser::new(response.bytes_stream()).boxed())
    }
}

impl TranslationSource for ChatCompletionsSource {
    fn translate(
        &self,
        request: TranslationRequest,
        cancel: CancellationToken,
    ) -> TranslationStream {
        let source = self.clone();
        stream::once(async move { source.send_stream(&request).await })
            .flat_map(|opened| match opened {
                Ok(deltas) => accumulate(deltas).boxed(),
                Err(err) => stream::once(ready(Err(err))).boxed(),
            })
            .take_until(cancel.cancelled_owned())
            .boxed()
    }
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatCompletionMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(model: &'a str, system: &'a str, text: &'a str) -> Self {
        Self {
            model,
            messages: [
                ChatCompletionMessage {
                    role: "system",
                    content: system,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: text,
                },
            ],
            stream: true,
        }
    }
}

/// Appends a blank line once the body ends so a final event without a
/// trailing separator is still dispatched by the SSE decoder.
struct SseTerminatedStream<S> {
    inner: S,
    emitted_terminator: bool,
}

impl<S> SseTerminatedStream<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            emitted_terminator: false,
        }
    }
}

impl<S, E> Stream for SseTerminatedStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
{
    type Item = std::result::Result<bytes::Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.emitted_terminator {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(None) => {
                self.emitted_terminator = true;
                Poll::Ready(Some(Ok(bytes::Bytes::from_static(b"\n\n"))))
            }
            other => other,
        }
    }
}

/// SSE parser yielding `choices[0].delta.content` values.
struct ChatCompletionsSseParser<S> {
    inner: EventStream<SseTerminatedStream<S>>,
    pending: VecDeque<ProviderResult<String>>,
    finished: bool,
}

impl<S> ChatCompletionsSseParser<S> {
    fn new<E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    {
        Self {
            inner: SseTerminatedStream::new(stream).eventsource(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn handle_event_data(&mut self, data: &str) {
        let trimmed = data.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed == "[DONE]" {
            self.finished = true;
            return;
        }

        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            // Keepalive comments and vendor noise are not fatal.
            Err(err) => {
                debug!("Skipping unparseable SSE data: {err}");
                return;
            }
        };

        if let Some(error) = value.get("error") {
            let error_type = error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("error");
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            self.pending
                .push_back(Err(ProviderError::api_error(error_type, message)));
            self.finished = true;
            return;
        }

        let content = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("content"))
            .and_then(Value::as_str);
        if let Some(text) = content {
            self.pending.push_back(Ok(text.to_string()));
        }
    }
}

impl<S, E> Stream for ChatCompletionsSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => self.handle_event_data(&event.data),
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ProviderError::network(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn sse_bytes(body: &'static str) -> impl Stream<Item = Result<bytes::Bytes, Infallible>> + Unpin {
        stream::iter(vec![Ok(bytes::Bytes::from_static(body.as_bytes()))])
    }

    async fn collect(body: &'static str) -> Vec<ProviderResult<String>> {
        ChatCompletionsSseParser::new(sse_bytes(body)).collect().await
    }

    #[tokio::test]
    async fn test_parser_yields_content_deltas_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );

        let items: Vec<String> = collect(body)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(items, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_parser_flushes_final_event_without_separator() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        let items = collect(body).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().ok(), Some("tail"));
    }

    #[tokio::test]
    async fn test_parser_error_event_is_terminal() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
            "data: {\"error\":{\"type\":\"overloaded_error\",\"message\":\"busy\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
        );

        let items = collect(body).await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ApiError);
        assert_eq!(err.message, "overloaded_error: busy");
    }

    #[tokio::test]
    async fn test_parser_skips_garbage_lines() {
        let body = concat!(
            ": keepalive\n\n",
            "data: not json\n\n",
            "data: {\"choices\":[]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        );
        let items = collect(body).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().ok(), Some("ok"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatCompletionRequest::new("gpt-4o-mini", "sys", "你好");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "你好"}
                ],
                "stream": true
            })
        );
    }
}
