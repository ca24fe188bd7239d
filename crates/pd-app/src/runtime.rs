//! Event loop that feeds inbound collaborator events into the controller.
//!
//! Collaborators (discovery feeds, capability fetches, timers) only hold an
//! `UnboundedSender<InboundEvent>`. The loop applies each event to completion
//! before taking the next, so the registry never sees interleaved mutations.

use pd_core::InboundEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::controller::SelectionController;

/// Why [`run_controller`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The stop predicate was satisfied.
    Finished,
    /// Every sender was dropped.
    Closed,
}

/// Drive `controller` until `until` returns `true` or the channel closes.
///
/// `until` is checked once before the first event and after every event.
pub async fn run_controller<F>(
    controller: &mut SelectionController,
    inbound: &mut mpsc::UnboundedReceiver<InboundEvent>,
    mut until: F,
) -> LoopExit
where
    F: FnMut(&SelectionController) -> bool,
{
    if until(controller) {
        return LoopExit::Finished;
    }

    while let Some(event) = inbound.recv().await {
        debug!(?event, "inbound event");
        if let Err(err) = controller.handle(event) {
            warn!(error = %err, "inbound event rejected");
        }
        if until(controller) {
            return LoopExit::Finished;
        }
    }

    debug!("inbound channel closed");
    LoopExit::Closed
}
