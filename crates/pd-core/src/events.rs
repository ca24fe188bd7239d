//! Events crossing the core boundary.
//!
//! [`InboundEvent`] carries collaborator callbacks, timer fires and user input
//! into the controller. [`DestinationEvent`] is what subscribers observe.

use serde::{Deserialize, Serialize};

use crate::destination::{Capabilities, DestinationDescriptor, DestinationKey, Origin};

/// Identifies an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerToken {
    /// Upper bound on waiting for the auto-select rule.
    AutoSelect,
    /// Forced completion of a discovery search.
    DiscoveryDeadline { origin: Origin, run: u32 },
}

/// Input processed by the selection controller, one at a time.
///
/// 控制器按顺序处理的输入事件。
#[derive(Debug, Clone)]
pub enum InboundEvent {
    DestinationsFound {
        origin: Origin,
        destinations: Vec<DestinationDescriptor>,
    },
    DiscoveryDone {
        origin: Origin,
    },
    CapabilitiesReady {
        key: DestinationKey,
        capabilities: Capabilities,
    },
    CapabilitiesFailed {
        key: DestinationKey,
        reason: String,
    },
    ProvisionalResolved {
        key: DestinationKey,
        destination: DestinationDescriptor,
    },
    ProvisionalFailed {
        key: DestinationKey,
    },
    TimerFired(TimerToken),
    UserSelected(Option<DestinationKey>),
    /// Sign-in state changed; cloud destinations must be rediscovered.
    AccountsChanged,
}

/// Notification emitted after the mutation it describes has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationEvent {
    DestinationsChanged,
    SelectionChanged {
        key: Option<DestinationKey>,
    },
    CapabilitiesReady {
        key: DestinationKey,
    },
    CapabilitiesFailed {
        key: DestinationKey,
        reason: String,
    },
    SearchStarted {
        origin: Origin,
    },
    SearchDone {
        origin: Origin,
        timed_out: bool,
    },
    ProvisionalResolved {
        provisional: DestinationKey,
        resolved: DestinationKey,
    },
    ProvisionalResolutionFailed {
        key: DestinationKey,
    },
    /// The fallback policy found nothing to select.
    NoDestinationsFound,
}
