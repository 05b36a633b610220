//! Messages exchanged over a translation port.
//!
//! Messages travel as `serde_json::Value` because the channel crosses a
//! process boundary and is not type-checked at runtime. Consumers decode with
//! [`ProducerMessage::decode`], which drops anything it does not recognize.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TranslationConfig;

/// Name every translation port is opened with.
pub const PORT_NAME: &str = "tran-translate";

/// Stable classification of a terminal producer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No credential configured.
    NoApiKey,
    /// The endpoint rejected the credential.
    InvalidApiKey,
    /// The request timed out.
    Timeout,
    /// Connection or transport failure.
    Network,
    /// Anything else.
    #[default]
    Unknown,
}

impl ErrorCode {
    /// Returns whether the remedy is to open the settings.
    pub fn is_configuration(self) -> bool {
        matches!(self, Self::NoApiKey | Self::InvalidApiKey)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoApiKey => write!(f, "no_api_key"),
            Self::InvalidApiKey => write!(f, "invalid_api_key"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Consumer to producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerMessage {
    /// Sent exactly once per session.
    Translate {
        text: String,
        config: TranslationConfig,
    },
}

impl ConsumerMessage {
    /// Decodes a raw message, returning `None` for anything unrecognized.
    pub fn decode(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }
}

/// Producer to consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProducerMessage {
    /// Full translated text accumulated so far (not a delta).
    Chunk {
        #[serde(rename = "accumulatedText")]
        accumulated_text: String,
    },
    /// Terminal success; follows the last chunk.
    Complete,
    /// Terminal failure; mutually exclusive with `Complete`.
    Error {
        message: String,
        #[serde(default)]
        code: ErrorCode,
    },
}

impl ProducerMessage {
    /// Decodes a raw message, returning `None` for anything unrecognized.
    pub fn decode(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }

    pub fn chunk(accumulated_text: impl Into<String>) -> Self {
        Self::Chunk {
            accumulated_text: accumulated_text.into(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}
