//! Per-origin discovery tracking.
//!
//! Wraps one [`DiscoverySession`] per origin with the side effects the pure
//! state machine leaves to its caller: issuing the discovery request, arming
//! and cancelling deadline timers, and emitting search notifications.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pd_core::discovery::{DiscoverySession, DiscoveryState, SessionTransition};
use pd_core::ports::{ClockPort, DiscoveryPort, TimerPort};
use pd_core::settings::defaults::DEFAULT_PRIVET_SEARCH_MS;
use pd_core::{DestinationEvent, DestinationSettings, Origin, TimerToken};
use tracing::{debug, info, warn};

use crate::events::EventBus;

/// Result of asking the tracker to start a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStart {
    /// A search run started or restarted.
    Started,
    /// A search is already running or finished and cannot be re-queried.
    Unchanged,
    /// The collaborator rejected the request; the run was closed right away
    /// and `SearchDone` has been emitted.
    Failed,
}

pub struct DiscoveryTracker {
    sessions: BTreeMap<Origin, DiscoverySession>,
    deadlines: BTreeMap<Origin, Duration>,
    discovery: Arc<dyn DiscoveryPort>,
    timer: Arc<dyn TimerPort>,
    clock: Arc<dyn ClockPort>,
    bus: EventBus,
}

impl DiscoveryTracker {
    pub fn new(
        settings: &DestinationSettings,
        discovery: Arc<dyn DiscoveryPort>,
        timer: Arc<dyn TimerPort>,
        clock: Arc<dyn ClockPort>,
        bus: EventBus,
    ) -> Self {
        let sessions = Origin::ALL
            .into_iter()
            .map(|origin| (origin, DiscoverySession::new(origin)))
            .collect();

        let deadlines = Origin::ALL
            .into_iter()
            .filter_map(|origin| {
                let deadline = settings.discovery_deadline(origin).or_else(|| {
                    // A source that never reports completion must still end.
                    (!origin.has_completion_signal())
                        .then(|| Duration::from_millis(DEFAULT_PRIVET_SEARCH_MS))
                });
                deadline.map(|d| (origin, d))
            })
            .collect();

        Self {
            sessions,
            deadlines,
            discovery,
            timer,
            clock,
            bus,
        }
    }

    pub fn state(&self, origin: Origin) -> DiscoveryState {
        self.sessions
            .get(&origin)
            .map_or(DiscoveryState::NotStarted, DiscoverySession::state)
    }

    pub fn is_in_progress(&self, origin: Origin) -> bool {
        self.state(origin) == DiscoveryState::InProgress
    }

    pub fn was_started(&self, origin: Origin) -> bool {
        self.state(origin) != DiscoveryState::NotStarted
    }

    pub fn any_in_progress(&self) -> bool {
        self.sessions.values().any(DiscoverySession::is_in_progress)
    }

    pub fn deadline(&self, origin: Origin) -> Option<Duration> {
        self.deadlines.get(&origin).copied()
    }

    pub fn start(&mut self, origin: Origin) -> DiscoveryStart {
        let now_ms = self.clock.now_ms();
        let deadline = self.deadline(origin);
        let Some(session) = self.sessions.get_mut(&origin) else {
            return DiscoveryStart::Unchanged;
        };

        let previous_run = session.run();
        let run = match session.start(now_ms, deadline) {
            SessionTransition::Started { run, .. } => run,
            SessionTransition::Restarted { run, .. } => {
                self.timer.cancel(TimerToken::DiscoveryDeadline {
                    origin,
                    run: previous_run,
                });
                run
            }
            _ => return DiscoveryStart::Unchanged,
        };

        if let Some(deadline) = deadline {
            self.timer
                .schedule(TimerToken::DiscoveryDeadline { origin, run }, deadline);
        }
        info!(%origin, run, ?deadline, "discovery started");
        self.bus.emit(DestinationEvent::SearchStarted { origin });

        if let Err(err) = self.discovery.start_discovery(origin) {
            warn!(%origin, error = %format!("{err:#}"), "discovery request failed");
            self.complete(origin);
            return DiscoveryStart::Failed;
        }
        DiscoveryStart::Started
    }

    /// The collaborator reported completion. Returns `true` if this ended a
    /// running search.
    pub fn complete(&mut self, origin: Origin) -> bool {
        let Some(session) = self.sessions.get_mut(&origin) else {
            return false;
        };
        let run = session.run();
        if session.complete() == SessionTransition::Ignored {
            debug!(%origin, "late discovery completion ignored");
            return false;
        }
        self.timer
            .cancel(TimerToken::DiscoveryDeadline { origin, run });
        self.finished(origin, false);
        true
    }

    /// The deadline armed for `run` fired. Returns `true` if this forced a
    /// running search to finish.
    pub fn expire(&mut self, origin: Origin, run: u32) -> bool {
        let Some(session) = self.sessions.get_mut(&origin) else {
            return false;
        };
        if session.expire(run) == SessionTransition::Ignored {
            return false;
        }
        self.finished(origin, true);
        true
    }

    pub fn reset(&mut self, origins: &[Origin]) {
        for origin in origins {
            if let Some(session) = self.sessions.get_mut(origin) {
                self.timer.cancel(TimerToken::DiscoveryDeadline {
                    origin: *origin,
                    run: session.run(),
                });
                session.reset();
            }
        }
    }

    fn finished(&self, origin: Origin, timed_out: bool) {
        info!(%origin, timed_out, "discovery done");
        self.bus
            .emit(DestinationEvent::SearchDone { origin, timed_out });
    }
}
