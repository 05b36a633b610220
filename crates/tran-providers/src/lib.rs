//! Translation producer: streaming LLM client and the port worker that serves it.

pub mod openai;
pub mod prompt;
pub mod shared;
pub mod source;
pub mod worker;

pub use shared::{ProviderError, ProviderErrorKind, ProviderResult, USER_AGENT};
pub use source::{TranslationRequest, TranslationSource, TranslationStream, accumulate};
pub use worker::{TranslationWorker, WorkerHandle};
