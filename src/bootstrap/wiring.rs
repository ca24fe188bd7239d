//! Dependency wiring: infra adapters behind the controller's ports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use pd_app::{EventBus, SelectionController, SelectionPorts};
use pd_core::{DestinationSettings, InboundEvent};
use pd_infra::fixture::FixtureFeed;
use pd_infra::{FileSelectionStore, SystemClock, TokioTimer};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::info;

/// Files a selection session reads and writes.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub config: PathBuf,
    pub state: PathBuf,
    pub fixture: PathBuf,
}

/// A controller wired to the fixture feed, the file store and tokio timers,
/// plus the inbound channel every adapter posts to.
pub struct Wired {
    pub controller: SelectionController,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
}

pub fn wire_controller(
    settings: DestinationSettings,
    paths: &SessionPaths,
    runtime: Handle,
    bus: EventBus,
) -> Result<Wired> {
    let (tx, inbound) = mpsc::unbounded_channel();

    let feed = Arc::new(FixtureFeed::load(&paths.fixture, runtime.clone(), tx.clone())?);
    let store = Arc::new(FileSelectionStore::new(&paths.state, settings.max_recent));
    let timer = Arc::new(TokioTimer::new(runtime, tx));

    info!(
        state = %paths.state.display(),
        fixture = %paths.fixture.display(),
        "wiring selection controller"
    );

    let ports = SelectionPorts {
        discovery: feed.clone(),
        capabilities: feed.clone(),
        store,
        provisional: feed,
        timer,
        clock: Arc::new(SystemClock),
    };

    Ok(Wired {
        controller: SelectionController::new(settings, ports, bus),
        inbound,
    })
}
