//! Persistent duplex channel between consumer and producer.
//!
//! A [`Port`] is one end of a bounded pair of `tokio::sync::mpsc` channels.
//! Dropping either half of either end is a disconnect, which both sides treat
//! as cancellation.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Default capacity of each direction of a port.
pub const DEFAULT_PORT_CAPACITY: usize = 64;

/// The other side of the port is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortClosed;

impl fmt::Display for PortClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port disconnected")
    }
}

impl std::error::Error for PortClosed {}

/// Opens ports to a producer.
pub trait Connector: Send + Sync {
    /// Opens a new port with the given name.
    ///
    /// # Errors
    /// Returns `PortClosed` if the producer is no longer accepting ports.
    fn connect(&self, name: &str) -> Result<Port, PortClosed>;
}

/// Sending half of a port.
#[derive(Debug, Clone)]
pub struct PortSender {
    tx: mpsc::Sender<Value>,
}

impl PortSender {
    /// Sends a message, waiting for capacity.
    ///
    /// # Errors
    /// Returns `PortClosed` if the peer disconnected.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), PortClosed> {
        let value = serde_json::to_value(message).map_err(|_| PortClosed)?;
        self.tx.send(value).await.map_err(|_| PortClosed)
    }

    /// Sends without waiting; fails if the peer is gone or the port is full.
    ///
    /// # Errors
    /// Returns `PortClosed` if the message could not be queued.
    pub fn post<T: Serialize>(&self, message: &T) -> Result<(), PortClosed> {
        let value = serde_json::to_value(message).map_err(|_| PortClosed)?;
        self.tx.try_send(value).map_err(|_| PortClosed)
    }

    /// Resolves once the peer's receiving half is dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a port.
#[derive(Debug)]
pub struct PortReceiver {
    rx: mpsc::Receiver<Value>,
}

impl PortReceiver {
    /// Receives the next raw message; `None` once the peer disconnected.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Receives without waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

/// One end of a duplex port.
#[derive(Debug)]
pub struct Port {
    name: String,
    sender: PortSender,
    receiver: PortReceiver,
}

impl Port {
    /// Creates a connected pair of ports sharing `name`.
    pub fn pair(name: &str) -> (Port, Port) {
        Self::pair_with_capacity(name, DEFAULT_PORT_CAPACITY)
    }

    pub fn pair_with_capacity(name: &str, capacity: usize) -> (Port, Port) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        let a = Port {
            name: name.to_string(),
            sender: PortSender { tx: a_tx },
            receiver: PortReceiver { rx: a_rx },
        };
        let b = Port {
            name: name.to_string(),
            sender: PortSender { tx: b_tx },
            receiver: PortReceiver { rx: b_rx },
        };
        (a, b)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender(&self) -> &PortSender {
        &self.sender
    }

    /// Splits into independently owned halves.
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }

    /// Receives the next raw message; `None` once the peer disconnected.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Disconnects both directions.
    pub fn disconnect(self) {
        drop(self);
    }
}
