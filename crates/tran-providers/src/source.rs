//! The producer-facing contract: text in, growing translation out.

use futures_util::future::ready;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tran_types::TranslationConfig;

use crate::shared::ProviderResult;

/// One translate request as received from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub config: TranslationConfig,
}

/// Lazy, finite, non-restartable sequence of accumulated translations.
///
/// Every item is the full text produced so far. The stream ends after the
/// last increment, after the first error, or once cancelled.
pub type TranslationStream = BoxStream<'static, ProviderResult<String>>;

/// A backend able to translate text as a stream.
pub trait TranslationSource: Send + Sync + 'static {
    /// Starts a translation. Nothing is sent before the stream is first
    /// polled; once `cancel` fires the stream yields no further items.
    fn translate(&self, request: TranslationRequest, cancel: CancellationToken)
    -> TranslationStream;
}

/// Folds a stream of text deltas into a stream of accumulated text.
///
/// Empty deltas are skipped so consecutive items always grow. Errors are
/// passed through unchanged.
pub fn accumulate<S>(deltas: S) -> impl Stream<Item = ProviderResult<String>> + Send + 'static
where
    S: Stream<Item = ProviderResult<String>> + Send + 'static,
{
    deltas
        .filter(|item| ready(!matches!(item, Ok(delta) if delta.is_empty())))
        .scan(String::new(), |accumulated, item| {
            let next = match item {
                Ok(delta) => {
                    accumulated.push_str(&delta);
                    Ok(accumulated.clone())
                }
                Err(err) => Err(err),
            };
            ready(Some(next))
        })
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::shared::ProviderError;

    #[tokio::test]
    async fn test_accumulate_yields_growing_text() {
        let deltas = stream::iter(vec![
            Ok("H".to_string()),
            Ok(String::new()),
            Ok("e".to_string()),
            Ok("l".to_string()),
        ]);

        let items: Vec<String> = accumulate(deltas)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["H", "He", "Hel"]);
    }

    #[tokio::test]
    async fn test_accumulate_passes_errors_through() {
        let deltas = stream::iter(vec![
            Ok("Hi".to_string()),
            Err(ProviderError::network("reset")),
        ]);

        let items: Vec<ProviderResult<String>> = accumulate(deltas).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("Hi"));
        assert_eq!(items[1].as_ref().unwrap_err().message, "reset");
    }
}
