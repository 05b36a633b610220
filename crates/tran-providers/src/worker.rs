//! Port worker: the privileged side that owns network access.
//!
//! The worker accepts ports, reads one `translate` request from each, and
//! streams `chunk` messages followed by exactly one `complete` or `error`.
//! A consumer disconnect cancels the in-flight translation; it is never
//! reported as an error.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tran_types::{
    Connector, ConsumerMessage, PORT_NAME, Port, PortClosed, PortReceiver, PortSender,
    ProducerMessage, sanitize_for_log,
};

use crate::shared::ProviderError;
use crate::source::{TranslationRequest, TranslationSource};

/// Capacity of the pending-connection queue.
const ACCEPT_QUEUE_CAPACITY: usize = 16;

/// Serves translation ports with a [`TranslationSource`].
pub struct TranslationWorker<S> {
    source: Arc<S>,
}

impl<S: TranslationSource> TranslationWorker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Spawns the accept loop and returns a handle consumers connect through.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(ACCEPT_QUEUE_CAPACITY);
        let task = tokio::spawn(self.accept_loop(rx));
        WorkerHandle {
            tx,
            task: Arc::new(task),
        }
    }

    async fn accept_loop(self, mut incoming: mpsc::Receiver<Port>) {
        while let Some(port) = incoming.recv().await {
            if port.name() != PORT_NAME {
                debug!(name = port.name(), "Ignoring port with unknown name");
                continue;
            }
            let source = Arc::clone(&self.source);
            tokio::spawn(async move { serve_port(source.as_ref(), port).await });
        }
    }
}

/// Connection handle to a spawned [`TranslationWorker`].
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Port>,
    task: Arc<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stops accepting new ports. Ports already being served keep running.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Connector for WorkerHandle {
    fn connect(&self, name: &str) -> Result<Port, PortClosed> {
        let (consumer, producer) = Port::pair(name);
        self.tx.try_send(producer).map_err(|_| PortClosed)?;
        Ok(consumer)
    }
}

/// Serves a single port until the translation finishes or the consumer leaves.
pub async fn serve_port<S: TranslationSource + ?Sized>(source: &S, port: Port) {
    let (tx, mut rx) = port.split();

    let Some(request) = read_request(&mut rx).await else {
        debug!("Port closed before a translate request arrived");
        return;
    };
    debug!(
        text_chars = request.text.chars().count(),
        config = %serde_json::to_value(&request.config)
            .map(|value| sanitize_for_log(&value))
            .unwrap_or_default(),
        "Received translate request"
    );

    if !request.config.has_credential() {
        let err = ProviderError::missing_credential();
        info!("Rejecting translate request without a credential");
        // Consumer may already be gone; nothing else to do either way.
        let _ = forward(&tx, &ProducerMessage::error(err.code(), err.message)).await;
        return;
    }

    let cancel = CancellationToken::new();
    let mut stream = source.translate(request, cancel.clone());
    let mut chunks = 0usize;

    loop {
        tokio::select! {
            biased;
            () = tx.closed() => {
                debug!(chunks, "Consumer disconnected during streaming");
                cancel.cancel();
                return;
            }
            inbound = rx.recv() => {
                if inbound.is_none() {
                    debug!(chunks, "Consumer closed its side of the port");
                    cancel.cancel();
                    return;
                }
                // Only one translate request per port; anything else is noise.
            }
            item = stream.next() => match item {
                Some(Ok(accumulated)) => {
                    chunks += 1;
                    debug!(chunk = chunks, chars = accumulated.chars().count(), "Forwarding chunk");
                    if forward(&tx, &ProducerMessage::chunk(accumulated)).await.is_err() {
                        cancel.cancel();
                        return;
                    }
                }
                Some(Err(err)) => {
                    warn!(kind = %err.kind, details = ?err.details, "Translation failed: {err}");
                    let _ = forward(&tx, &ProducerMessage::error(err.code(), err.message)).await;
                    return;
                }
                None => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    info!(chunks, "Translation complete");
                    let _ = forward(&tx, &ProducerMessage::Complete).await;
                    return;
                }
            }
        }
    }
}

async fn read_request(rx: &mut PortReceiver) -> Option<TranslationRequest> {
    while let Some(raw) = rx.recv().await {
        match ConsumerMessage::decode(&raw) {
            Some(ConsumerMessage::Translate { text, config }) => {
                return Some(TranslationRequest { text, config });
            }
            None => debug!(message = %sanitize_for_log(&raw), "Ignoring unrecognized message"),
        }
    }
    None
}

/// Sends a message; a disconnected consumer is a stop signal, not an error.
async fn forward(tx: &PortSender, message: &ProducerMessage) -> Result<(), PortClosed> {
    tx.send(message).await.inspect_err(|_| {
        debug!("Port disconnected while sending; stopping");
    })
}
