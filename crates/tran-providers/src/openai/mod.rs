//! OpenAI-compatible provider helpers and clients.

pub mod chat_completions;

pub use chat_completions::ChatCompletionsSource;
