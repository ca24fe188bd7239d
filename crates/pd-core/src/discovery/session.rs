//! Discovery session state machine.
//!
//! One session exists per origin. A search ends on whichever comes first: the
//! collaborator's completion signal or the armed deadline. The session itself
//! is pure; the caller owns the clock and the timer.
//!
//! ```text
//! NotStarted --start--> InProgress --complete/expire--> Done
//!                          ^                              |
//!                          +------- start (re-query) -----+
//! ```
//!
//! Every search run gets a new run number so that a deadline armed for a
//! superseded run can be told apart from the current one.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::destination::Origin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    NotStarted,
    InProgress,
    Done,
}

/// Outcome of feeding a signal into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// A search run began. The caller should issue the discovery request and
    /// arm a timer for `run` when a deadline is returned.
    Started {
        run: u32,
        deadline_ms: Option<i64>,
    },
    /// A re-queryable search was restarted; the previous run's deadline is void.
    Restarted {
        run: u32,
        deadline_ms: Option<i64>,
    },
    /// The running search finished.
    Completed { timed_out: bool },
    /// Nothing changed.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct DiscoverySession {
    origin: Origin,
    state: DiscoveryState,
    run: u32,
    deadline_ms: Option<i64>,
}

impl DiscoverySession {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            state: DiscoveryState::NotStarted,
            run: 0,
            deadline_ms: None,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Number of the current (or last) search run; 0 before the first start.
    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == DiscoveryState::InProgress
    }

    pub fn is_done(&self) -> bool {
        self.state == DiscoveryState::Done
    }

    /// Request a search.
    ///
    /// Idempotent once started, except for origins that support re-query,
    /// which restart with a fresh deadline.
    pub fn start(&mut self, now_ms: i64, deadline: Option<Duration>) -> SessionTransition {
        let restart = match self.state {
            DiscoveryState::NotStarted => false,
            DiscoveryState::InProgress | DiscoveryState::Done if self.origin.supports_requery() => {
                true
            }
            _ => return SessionTransition::Ignored,
        };

        let deadline_ms = deadline.map(|d| now_ms.saturating_add(d.as_millis() as i64));
        self.run = self.run.wrapping_add(1);
        self.state = DiscoveryState::InProgress;
        self.deadline_ms = deadline_ms;

        if restart {
            SessionTransition::Restarted {
                run: self.run,
                deadline_ms,
            }
        } else {
            SessionTransition::Started {
                run: self.run,
                deadline_ms,
            }
        }
    }

    /// The collaborator reported that the search finished.
    pub fn complete(&mut self) -> SessionTransition {
        self.finish(false)
    }

    /// The deadline armed for `run` fired.
    pub fn expire(&mut self, run: u32) -> SessionTransition {
        if run != self.run || self.deadline_ms.is_none() {
            #[cfg(feature = "logging")]
            tracing::trace!(origin = %self.origin, run, current_run = self.run, "ignoring stale discovery deadline");
            return SessionTransition::Ignored;
        }
        self.finish(true)
    }

    pub fn reset(&mut self) {
        self.state = DiscoveryState::NotStarted;
        self.deadline_ms = None;
    }

    fn finish(&mut self, timed_out: bool) -> SessionTransition {
        if self.state != DiscoveryState::InProgress {
            return SessionTransition::Ignored;
        }
        self.state = DiscoveryState::Done;
        self.deadline_ms = None;
        SessionTransition::Completed { timed_out }
    }
}
