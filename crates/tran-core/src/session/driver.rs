use std::future::{Future, pending};

use tokio::time::{Instant, sleep_until};
use tran_types::{Connector, PortReceiver};

use super::{Controller, SessionOutcome};
use crate::surface::Surface;

/// Drives an active session until it ends.
///
/// Multiplexes the interruption future, producer messages and the throttle
/// deadline. Host input events are fed to the interruption watcher before
/// every step. A controller with no active session reports `Interrupted`.
pub async fn run_session<C, F>(
    controller: &mut Controller<C>,
    surface: &mut dyn Surface,
    mut receiver: PortReceiver,
    interrupt: F,
) -> SessionOutcome
where
    C: Connector,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    loop {
        if let Some(outcome) = controller.pump_input(surface) {
            return outcome;
        }
        if !controller.is_active() {
            return SessionOutcome::Interrupted;
        }
        let deadline = controller.throttle_deadline();

        let step = tokio::select! {
            biased;
            () = &mut interrupt => Some(
                controller
                    .interrupt(surface)
                    .unwrap_or(SessionOutcome::Interrupted),
            ),
            message = receiver.recv() => match message {
                Some(raw) => controller.handle_message(surface, &raw, Instant::now()),
                None => Some(
                    controller
                        .handle_disconnect(surface)
                        .unwrap_or(SessionOutcome::Interrupted),
                ),
            },
            () = wait_until(deadline) => controller.flush_due(surface, Instant::now()),
        };

        if let Some(outcome) = step {
            return outcome;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
