//! One startup-selection session, from config load to the settled outcome.

use std::time::Duration;

use anyhow::Result;
use pd_app::{run_controller, EventBus, LoopExit, SelectionController};
use pd_core::{Destination, DestinationEvent, DestinationKey};
use pd_infra::config::load_settings;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use super::wiring::{wire_controller, SessionPaths};

/// Extra time granted past the auto-select timeout for the last capability
/// fetch to come back.
const SETTLE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitiesOutcome {
    Ready,
    Failed,
    Pending,
}

/// What a session settled on, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub selected: Option<Destination>,
    pub capabilities: CapabilitiesOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub no_destinations_found: bool,
    pub timed_out: bool,
    pub destinations: Vec<Destination>,
}

/// Follows the notification stream to tell when the session has settled.
#[derive(Debug, Default)]
struct OutcomeWatcher {
    current: Option<DestinationKey>,
    capabilities: Option<Result<(), String>>,
    no_destinations: bool,
}

impl OutcomeWatcher {
    fn observe(&mut self, event: DestinationEvent) {
        match event {
            DestinationEvent::SelectionChanged { key } => {
                self.current = key;
                self.capabilities = None;
                self.no_destinations = false;
            }
            DestinationEvent::CapabilitiesReady { key } if self.current.as_ref() == Some(&key) => {
                self.capabilities = Some(Ok(()));
            }
            DestinationEvent::CapabilitiesFailed { key, reason }
                if self.current.as_ref() == Some(&key) =>
            {
                self.capabilities = Some(Err(reason));
            }
            DestinationEvent::NoDestinationsFound => self.no_destinations = true,
            _ => {}
        }
    }

    fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<DestinationEvent>) {
        while let Ok(event) = events.try_recv() {
            self.observe(event);
        }
    }

    fn is_settled(&self, controller: &SelectionController) -> bool {
        if controller.is_auto_selecting() {
            return false;
        }
        match &self.current {
            Some(_) => self.capabilities.is_some(),
            None => self.no_destinations,
        }
    }

    fn into_outcome(self, controller: &SelectionController, timed_out: bool) -> SessionOutcome {
        let (capabilities, failure) = match self.capabilities {
            Some(Ok(())) => (CapabilitiesOutcome::Ready, None),
            Some(Err(reason)) => (CapabilitiesOutcome::Failed, Some(reason)),
            None => (CapabilitiesOutcome::Pending, None),
        };
        let registry = controller.registry();
        SessionOutcome {
            selected: registry.selected().cloned(),
            capabilities,
            failure,
            no_destinations_found: self.no_destinations,
            timed_out,
            destinations: registry.destinations().cloned().collect(),
        }
    }
}

/// Run startup selection against the configured collaborators until the
/// selection and its capabilities settle, or `timeout` elapses.
///
/// Without an explicit `timeout` the session waits for the auto-select
/// timeout plus a short grace period.
pub async fn run_session(paths: SessionPaths, timeout: Option<Duration>) -> Result<SessionOutcome> {
    let settings = load_settings(&paths.config)?;
    let timeout = timeout.unwrap_or_else(|| settings.auto_select_timeout() + SETTLE_GRACE);

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let wired = wire_controller(settings, &paths, Handle::current(), bus)?;
    let mut controller = wired.controller;
    let mut inbound = wired.inbound;
    let mut watcher = OutcomeWatcher::default();

    controller.start();

    let session = run_controller(&mut controller, &mut inbound, |controller| {
        watcher.drain(&mut events);
        watcher.is_settled(controller)
    });
    let timed_out = match tokio::time::timeout(timeout, session)
        .instrument(info_span!("destinations.session"))
        .await
    {
        Ok(LoopExit::Finished) => false,
        Ok(LoopExit::Closed) => {
            warn!("inbound channel closed before the session settled");
            false
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "session did not settle in time");
            true
        }
    };

    watcher.drain(&mut events);
    let outcome = watcher.into_outcome(&controller, timed_out);
    info!(
        selected = ?outcome.selected.as_ref().map(Destination::key),
        capabilities = ?outcome.capabilities,
        "session finished"
    );
    Ok(outcome)
}
