//! Wire contracts shared by the translation producer and the surface consumer.
//!
//! Everything in this crate crosses the process boundary between the
//! privileged producer (network access) and the page-side consumer.

pub mod config;
pub mod port;
pub mod protocol;
pub mod redact;

pub use config::TranslationConfig;
pub use port::{Connector, Port, PortClosed, PortReceiver, PortSender};
pub use protocol::{ConsumerMessage, ErrorCode, PORT_NAME, ProducerMessage};
pub use redact::sanitize_for_log;
