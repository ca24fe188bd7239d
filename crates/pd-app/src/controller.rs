//! Selection controller
//!
//! 负责启动时的目标选择：优先恢复上次选择，其次按默认规则匹配，
//! 最后在超时或所有来源完成后执行回退策略。
//!
//! # Architecture / 架构
//!
//! ```text
//! Discovery / Capabilities / Timer / User inputs
//!   ↓ (InboundEvent, one at a time)
//! SelectionController
//!   ├── DiscoveryTracker   (per-origin sessions, deadlines)
//!   └── DestinationRegistry (dedup, auto-select, fallback)
//!   ↓
//! EventBus → subscribers
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use pd_core::ports::{
    CapabilitiesPort, ClockPort, DiscoveryPort, ProvisionalResolverPort, SelectionStorePort,
    TimerPort,
};
use pd_core::selection::FallbackPolicy;
use pd_core::{
    DestinationEvent, DestinationKey, DestinationSettings, InboundEvent, MatchRule, Origin,
    SelectError, TimerToken,
};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn};

use crate::discovery::{DiscoveryStart, DiscoveryTracker};
use crate::events::EventBus;
use crate::registry::DestinationRegistry;

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct SelectionPorts {
    pub discovery: Arc<dyn DiscoveryPort>,
    pub capabilities: Arc<dyn CapabilitiesPort>,
    pub store: Arc<dyn SelectionStorePort>,
    pub provisional: Arc<dyn ProvisionalResolverPort>,
    pub timer: Arc<dyn TimerPort>,
    pub clock: Arc<dyn ClockPort>,
}

pub struct SelectionController {
    settings: DestinationSettings,
    registry: DestinationRegistry,
    tracker: DiscoveryTracker,
    store: Arc<dyn SelectionStorePort>,
    provisional: Arc<dyn ProvisionalResolverPort>,
    timer: Arc<dyn TimerPort>,
    bus: EventBus,
    /// Origins whose completion can end the wait for the preferred destination.
    interest: BTreeSet<Origin>,
    /// Startup auto-selection has not concluded yet.
    auto_select_active: bool,
}

impl SelectionController {
    pub fn new(settings: DestinationSettings, ports: SelectionPorts, bus: EventBus) -> Self {
        let fallback = FallbackPolicy::new(
            settings.system_default_id.as_deref(),
            &settings.save_to_file_id,
            settings.last_resort,
        );
        let registry = DestinationRegistry::new(
            fallback,
            ports.capabilities,
            ports.store.clone(),
            ports.clock.clone(),
            bus.clone(),
        );
        let tracker = DiscoveryTracker::new(
            &settings,
            ports.discovery,
            ports.timer.clone(),
            ports.clock,
            bus.clone(),
        );

        Self {
            settings,
            registry,
            tracker,
            store: ports.store,
            provisional: ports.provisional,
            timer: ports.timer,
            bus,
            interest: BTreeSet::new(),
            auto_select_active: false,
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DestinationEvent> {
        self.bus.subscribe()
    }

    pub fn registry(&self) -> &DestinationRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &DiscoveryTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &DestinationSettings {
        &self.settings
    }

    pub fn is_auto_selecting(&self) -> bool {
        self.auto_select_active
    }

    /// Begin startup selection.
    ///
    /// Tries the destination remembered from last time, then the injected
    /// default rules, then the fallback policy once discovery settles.
    /// Default origins are always searched; the rule's origins are searched
    /// in addition and decide when waiting can stop early.
    pub fn start(&mut self) {
        let _span = info_span!("destinations.start").entered();

        let rule = self.initial_rule();
        self.interest = match &rule {
            Some(rule) => rule.origins().clone(),
            None => self.settings.default_origins.iter().copied().collect(),
        };
        self.auto_select_active = true;
        if let Some(rule) = rule {
            self.registry.arm_rule(rule);
        }

        let recent: Vec<_> = self
            .store
            .load_recent_destinations()
            .iter()
            .map(|recent| recent.to_placeholder())
            .collect();
        if !recent.is_empty() {
            debug!(count = recent.len(), "restoring recent destinations");
            self.registry.insert_batch(recent);
        }

        self.timer
            .schedule(TimerToken::AutoSelect, self.settings.auto_select_timeout());

        let mut origins: BTreeSet<Origin> = self.settings.default_origins.iter().copied().collect();
        origins.extend(self.interest.iter().copied());
        for origin in origins {
            self.tracker.start(origin);
        }
        self.settle();
        self.maybe_fallback_early();
    }

    fn initial_rule(&self) -> Option<MatchRule> {
        let virtuals = self.settings.virtual_destinations.clone();

        if let Some(persisted) = self.store.load_persisted_selection() {
            info!(key = %persisted.key(), "restoring persisted selection");
            return Some(MatchRule::exact(persisted.origin, &persisted.id, virtuals));
        }

        let json = self.settings.default_selection_rules.as_deref()?;
        match MatchRule::from_default_rules_json(json, virtuals) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!(error = %err, "ignoring invalid default selection rules");
                None
            }
        }
    }

    /// Process one inbound event to completion.
    pub fn handle(&mut self, event: InboundEvent) -> Result<(), SelectError> {
        let result = match event {
            InboundEvent::DestinationsFound {
                origin,
                destinations,
            } => {
                debug!(%origin, count = destinations.len(), "destinations found");
                let destinations = destinations
                    .into_iter()
                    .map(|descriptor| descriptor.into_destination(origin))
                    .collect();
                self.registry.insert_batch(destinations);
                Ok(())
            }
            InboundEvent::DiscoveryDone { origin } => {
                if self.tracker.complete(origin) {
                    self.on_search_finished(origin);
                }
                Ok(())
            }
            InboundEvent::TimerFired(TimerToken::DiscoveryDeadline { origin, run }) => {
                if self.tracker.expire(origin, run) {
                    self.on_search_finished(origin);
                }
                Ok(())
            }
            InboundEvent::TimerFired(TimerToken::AutoSelect) => {
                if self.auto_select_active {
                    info!("auto-select timed out");
                    self.run_fallback();
                }
                Ok(())
            }
            InboundEvent::CapabilitiesReady { key, capabilities } => {
                self.registry.on_capabilities_ready(&key, capabilities);
                Ok(())
            }
            InboundEvent::CapabilitiesFailed { key, reason } => {
                self.registry.on_capabilities_failed(&key, &reason);
                Ok(())
            }
            InboundEvent::ProvisionalResolved { key, destination } => {
                let resolved = destination.into_destination(key.origin);
                self.registry.resolve_provisional(&key, resolved)
            }
            InboundEvent::ProvisionalFailed { key } => {
                self.registry.remove_provisional(&key);
                Ok(())
            }
            InboundEvent::UserSelected(key) => self.select(key.as_ref()),
            InboundEvent::AccountsChanged => {
                self.on_accounts_changed();
                Ok(())
            }
        };
        self.settle();
        result
    }

    /// Explicit selection; ends startup auto-selection.
    pub fn select(&mut self, key: Option<&DestinationKey>) -> Result<(), SelectError> {
        if key.is_none() && self.auto_select_active {
            // Clearing the selection abandons the startup search as well.
            self.registry.clear_rule();
        }
        self.registry.select(key)?;
        self.stop_auto_select();
        Ok(())
    }

    /// Start (or re-query) discovery for an origin outside of startup.
    pub fn start_discovery(&mut self, origin: Origin) -> DiscoveryStart {
        let outcome = self.tracker.start(origin);
        if outcome == DiscoveryStart::Failed {
            self.on_search_finished(origin);
        }
        outcome
    }

    /// Ask the host to resolve a provisional destination.
    pub fn resolve_provisional(&mut self, key: &DestinationKey) -> Result<(), SelectError> {
        match self.registry.get(key) {
            None => return Err(SelectError::Unknown(key.clone())),
            Some(destination) if !destination.is_provisional() => {
                return Err(SelectError::NotProvisional(key.clone()))
            }
            Some(_) => {}
        }

        if let Err(err) = self.provisional.resolve_provisional(key) {
            warn!(key = %key, error = %format!("{err:#}"), "provisional resolution request failed");
            self.registry.remove_provisional(key);
        }
        Ok(())
    }

    fn on_search_finished(&mut self, origin: Origin) {
        if self.interest.contains(&origin) {
            self.maybe_fallback_early();
        }
    }

    /// Every relevant source has reported and the rule is still unsatisfied:
    /// no reason to wait out the full auto-select timeout.
    fn maybe_fallback_early(&mut self) {
        if !self.auto_select_active || self.tracker.any_in_progress() {
            return;
        }
        let all_reported = self
            .interest
            .iter()
            .all(|origin| self.tracker.was_started(*origin));
        if all_reported {
            info!("all relevant discovery finished without a match");
            self.run_fallback();
        }
    }

    fn run_fallback(&mut self) {
        self.stop_auto_select();
        self.registry.select_fallback(None);
    }

    fn stop_auto_select(&mut self) {
        if self.auto_select_active {
            self.auto_select_active = false;
            self.timer.cancel(TimerToken::AutoSelect);
        }
    }

    /// Startup selection concludes once the rule is satisfied.
    fn settle(&mut self) {
        if self.auto_select_active
            && !self.registry.has_pending_rule()
            && self.registry.selected_key().is_some()
        {
            debug!("startup selection settled");
            self.stop_auto_select();
        }
    }

    fn on_accounts_changed(&mut self) {
        let restart: Vec<Origin> = Origin::CLOUD
            .into_iter()
            .filter(|origin| self.tracker.was_started(*origin))
            .collect();
        let had_selection = self.registry.selected_key().is_some();
        let removed = self.registry.remove_origins(&Origin::CLOUD);
        self.tracker.reset(&Origin::CLOUD);
        info!(removed, ?restart, "accounts changed, reloading cloud destinations");

        // A pending rule still gets its chance; otherwise the dropped
        // selection is replaced right away.
        if had_selection
            && self.registry.selected_key().is_none()
            && !self.registry.has_pending_rule()
        {
            info!("selected destination belonged to the old account, falling back");
            self.run_fallback();
        }

        for origin in restart {
            if self.tracker.start(origin) == DiscoveryStart::Failed {
                self.on_search_finished(origin);
            }
        }
    }
}
