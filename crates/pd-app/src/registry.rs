//! Destination registry
//!
//! Aggregates destinations reported by every discovery source, deduplicates
//! them by [`DestinationKey`], and owns the single current selection.
//!
//! # Architecture / 架构
//!
//! ```text
//! discovery feeds ──insert_batch──┐
//! capability fetch ──update───────┼──> DestinationRegistry ──> EventBus
//! user / controller ──select──────┘        │
//!                                          ├─> CapabilitiesPort (fetch on select)
//!                                          └─> SelectionStorePort (persist on select)
//! ```
//!
//! All mutation happens on one logical thread. Notifications are emitted only
//! after the mutation they describe has been applied, and at most once per batch.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use pd_core::ports::{CapabilitiesPort, ClockPort, SelectionStorePort};
use pd_core::selection::{FallbackChoice, FallbackPolicy};
use pd_core::{
    Capabilities, Destination, DestinationEvent, DestinationKey, MatchRule, Origin, SelectError,
};
use tracing::{debug, error, info, warn};

use crate::events::EventBus;

pub struct DestinationRegistry {
    /// Insertion-ordered records; the map key is the dedup key.
    destinations: IndexMap<DestinationKey, Destination>,
    /// Non-owning reference into `destinations`.
    selected: Option<DestinationKey>,
    /// Active auto-select rule, consulted on every inserted batch.
    rule: Option<MatchRule>,
    /// Destination picked by the rule whose capabilities are still outstanding.
    auto_select_target: Option<DestinationKey>,
    /// The last fallback found nothing; the next changed batch retries it.
    fallback_owed: bool,
    fallback: FallbackPolicy,
    capabilities: Arc<dyn CapabilitiesPort>,
    store: Arc<dyn SelectionStorePort>,
    clock: Arc<dyn ClockPort>,
    bus: EventBus,
}

impl DestinationRegistry {
    pub fn new(
        fallback: FallbackPolicy,
        capabilities: Arc<dyn CapabilitiesPort>,
        store: Arc<dyn SelectionStorePort>,
        clock: Arc<dyn ClockPort>,
        bus: EventBus,
    ) -> Self {
        Self {
            destinations: IndexMap::new(),
            selected: None,
            rule: None,
            auto_select_target: None,
            fallback_owed: false,
            fallback,
            capabilities,
            store,
            clock,
            bus,
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get(&self, key: &DestinationKey) -> Option<&Destination> {
        self.destinations.get(key)
    }

    pub fn contains(&self, key: &DestinationKey) -> bool {
        self.destinations.contains_key(key)
    }

    /// All destinations in insertion order.
    pub fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.destinations.values()
    }

    /// Destinations usable by `account`: those needing no identity plus the
    /// ones bound to that account.
    pub fn destinations_for_account(&self, account: &str) -> Vec<&Destination> {
        self.destinations
            .values()
            .filter(|d| d.account.is_empty() || d.account == account)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn selected(&self) -> Option<&Destination> {
        self.selected.as_ref().and_then(|key| self.destinations.get(key))
    }

    pub fn selected_key(&self) -> Option<&DestinationKey> {
        self.selected.as_ref()
    }

    pub fn has_pending_rule(&self) -> bool {
        self.rule.is_some()
    }

    pub fn pending_rule(&self) -> Option<&MatchRule> {
        self.rule.as_ref()
    }

    pub fn auto_select_target(&self) -> Option<&DestinationKey> {
        self.auto_select_target.as_ref()
    }

    pub fn fallback_policy(&self) -> &FallbackPolicy {
        &self.fallback
    }

    // ---------------------------------------------------------------------
    // Insertion and update
    // ---------------------------------------------------------------------

    /// Insert one destination without notifying.
    ///
    /// Returns `true` when the destination is new, or when it upgrades a known
    /// record from `Unknown` to a definite connection status.
    pub fn insert(&mut self, destination: Destination) -> bool {
        let key = destination.key();
        match self.destinations.get_mut(&key) {
            None => {
                debug!(key = %key, "destination inserted");
                self.destinations.insert(key, destination);
                true
            }
            Some(existing)
                if !existing.connection_status.is_known()
                    && destination.connection_status.is_known() =>
            {
                debug!(
                    key = %key,
                    status = ?destination.connection_status,
                    "destination status upgraded"
                );
                existing.connection_status = destination.connection_status;
                true
            }
            Some(_) => false,
        }
    }

    /// Insert a batch, emit one `DestinationsChanged`, then run auto-select
    /// over the changed subset.
    pub fn insert_batch(&mut self, destinations: Vec<Destination>) -> bool {
        let mut changed = HashSet::new();
        for destination in destinations {
            let key = destination.key();
            if self.insert(destination) {
                changed.insert(key);
            }
        }
        if changed.is_empty() {
            return false;
        }

        self.bus.emit(DestinationEvent::DestinationsChanged);

        if self.rule.is_some() {
            self.auto_select(Some(&changed));
        } else if self.fallback_owed {
            self.select_fallback(None);
        }
        true
    }

    /// Convenience wrapper for a single-element batch.
    pub fn insert_one(&mut self, destination: Destination) -> bool {
        self.insert_batch(vec![destination])
    }

    /// Replace the mutable fields of a known destination and return the prior
    /// record. Unknown destinations are inserted instead and `None` is returned.
    pub fn update(&mut self, destination: Destination) -> Option<Destination> {
        let key = destination.key();
        let Some(existing) = self.destinations.get_mut(&key) else {
            self.insert_one(destination);
            return None;
        };

        let prior = existing.clone();
        existing.merge_mutable_fields(&destination);
        let has_capabilities = existing.has_capabilities();

        if has_capabilities && self.auto_select_target.as_ref() == Some(&key) {
            self.auto_select_target = None;
        }

        if self.selected.as_ref() == Some(&key) {
            if let Some(current) = self.destinations.get(&key) {
                self.store.persist_selection(current);
            }
            if has_capabilities {
                self.bus.emit(DestinationEvent::CapabilitiesReady { key });
            }
        }

        Some(prior)
    }

    pub fn on_capabilities_ready(&mut self, key: &DestinationKey, capabilities: Capabilities) {
        let Some(existing) = self.destinations.get(key) else {
            debug!(key = %key, "capabilities for unregistered destination dropped");
            return;
        };
        let updated = existing.clone().with_capabilities(capabilities);
        self.update(updated);
    }

    pub fn on_capabilities_failed(&mut self, key: &DestinationKey, reason: &str) {
        warn!(key = %key, reason, "capabilities fetch failed");

        if self.selected.as_ref() == Some(key) {
            self.bus.emit(DestinationEvent::CapabilitiesFailed {
                key: key.clone(),
                reason: reason.to_string(),
            });
        }

        if self.auto_select_target.as_ref() == Some(key) {
            self.auto_select_target = None;
            info!(key = %key, "auto-selected destination is unusable, falling back");
            self.select_fallback(Some(key));
        }
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    pub fn remove(&mut self, key: &DestinationKey) -> Option<Destination> {
        let removed = self.destinations.shift_remove(key)?;
        self.bus.emit(DestinationEvent::DestinationsChanged);
        self.forget_if_selected(std::slice::from_ref(key));
        Some(removed)
    }

    /// Drop every destination of the given origins. Returns how many went.
    pub fn remove_origins(&mut self, origins: &[Origin]) -> usize {
        let mut removed = Vec::new();
        self.destinations.retain(|key, _| {
            let keep = !origins.contains(&key.origin);
            if !keep {
                removed.push(key.clone());
            }
            keep
        });
        if removed.is_empty() {
            return 0;
        }
        self.bus.emit(DestinationEvent::DestinationsChanged);
        self.forget_if_selected(&removed);
        removed.len()
    }

    fn forget_if_selected(&mut self, removed: &[DestinationKey]) {
        if let Some(target) = &self.auto_select_target {
            if removed.contains(target) {
                self.auto_select_target = None;
            }
        }
        let Some(selected) = &self.selected else {
            return;
        };
        if removed.contains(selected) {
            self.selected = None;
            self.bus
                .emit(DestinationEvent::SelectionChanged { key: None });
        }
    }

    // ---------------------------------------------------------------------
    // Provisional destinations
    // ---------------------------------------------------------------------

    /// Swap a provisional record for its resolved form, keeping its position,
    /// and select the result.
    pub fn resolve_provisional(
        &mut self,
        provisional: &DestinationKey,
        resolved: Destination,
    ) -> Result<(), SelectError> {
        let resolved_key = resolved.key();
        let index = self
            .destinations
            .shift_remove_full(provisional)
            .map(|(index, _, _)| index);
        if index.is_none() {
            warn!(key = %provisional, "resolved provisional destination was not registered");
        }

        match self.destinations.get_mut(&resolved_key) {
            Some(existing) => existing.merge_mutable_fields(&resolved),
            None => {
                let at = index.unwrap_or(self.destinations.len());
                self.destinations.shift_insert(at, resolved_key.clone(), resolved);
            }
        }

        self.bus.emit(DestinationEvent::DestinationsChanged);
        self.bus.emit(DestinationEvent::ProvisionalResolved {
            provisional: provisional.clone(),
            resolved: resolved_key.clone(),
        });
        self.select(Some(&resolved_key))
    }

    /// Resolution failed; the provisional record is dropped.
    pub fn remove_provisional(&mut self, key: &DestinationKey) {
        if self.remove(key).is_none() {
            debug!(key = %key, "failed provisional destination was already gone");
        }
        self.bus
            .emit(DestinationEvent::ProvisionalResolutionFailed { key: key.clone() });
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    pub fn arm_rule(&mut self, rule: MatchRule) {
        debug!(origins = ?rule.origins(), "auto-select rule armed");
        self.rule = Some(rule);
        self.fallback_owed = false;
    }

    pub fn clear_rule(&mut self) -> Option<MatchRule> {
        self.rule.take()
    }

    /// Select `key`, or clear the selection with `None`.
    ///
    /// Clears the pending auto-select rule. Selecting the current destination
    /// again is a no-op. Provisional and unregistered destinations are
    /// rejected, as is clearing the selection while a rule is still pending.
    pub fn select(&mut self, key: Option<&DestinationKey>) -> Result<(), SelectError> {
        let Some(key) = key else {
            return self.clear_selection();
        };
        self.commit_selection(key, false)
    }

    /// `auto` marks `key` as the auto-select target before its capabilities
    /// are requested, so a fetch that fails on the spot still falls back.
    fn commit_selection(&mut self, key: &DestinationKey, auto: bool) -> Result<(), SelectError> {
        let Some(destination) = self.destinations.get_mut(key) else {
            error!(key = %key, "attempted to select an unregistered destination");
            return Err(SelectError::Unknown(key.clone()));
        };
        if destination.is_provisional() {
            error!(key = %key, "attempted to select a provisional destination");
            return Err(SelectError::Provisional(key.clone()));
        }

        self.rule = None;
        self.auto_select_target = None;
        self.fallback_owed = false;

        let has_capabilities = destination.has_capabilities();
        if auto && !has_capabilities {
            self.auto_select_target = Some(key.clone());
        }

        if self.selected.as_ref() == Some(key) {
            return Ok(());
        }

        destination.is_recent = true;
        destination.last_access_ms = Some(self.clock.now_ms());
        self.selected = Some(key.clone());

        info!(key = %key, name = %destination.display_name, "destination selected");
        self.store.persist_selection(destination);
        self.bus.emit(DestinationEvent::SelectionChanged {
            key: Some(key.clone()),
        });

        if has_capabilities {
            self.bus
                .emit(DestinationEvent::CapabilitiesReady { key: key.clone() });
        } else {
            self.request_capabilities(key);
        }
        Ok(())
    }

    fn clear_selection(&mut self) -> Result<(), SelectError> {
        if self.rule.is_some() {
            error!("attempted to clear the selection while an auto-select rule is pending");
            return Err(SelectError::DanglingRule);
        }
        self.auto_select_target = None;
        if self.selected.take().is_some() {
            self.bus
                .emit(DestinationEvent::SelectionChanged { key: None });
        }
        Ok(())
    }

    fn request_capabilities(&mut self, key: &DestinationKey) {
        debug!(key = %key, "fetching capabilities");
        if let Err(err) = self.capabilities.fetch_capabilities(key) {
            self.on_capabilities_failed(key, &format!("{err:#}"));
        }
    }

    /// Select the first destination, in insertion order, matching the active
    /// rule. Only keys in `subset` are considered when it is given.
    ///
    /// First match wins; there is no notion of a better match.
    pub fn auto_select(&mut self, subset: Option<&HashSet<DestinationKey>>) -> bool {
        let Some(rule) = &self.rule else {
            return false;
        };

        let matched = self
            .destinations
            .iter()
            .filter(|(key, _)| subset.is_none_or(|keys| keys.contains(*key)))
            .find(|(_, d)| !d.is_provisional() && rule.matches(d))
            .map(|(key, _)| key.clone());

        let Some(key) = matched else {
            return false;
        };

        info!(key = %key, "auto-select rule satisfied");
        self.commit_selection(&key, true).is_ok()
    }

    /// Apply the fallback policy. `exclude` is never chosen.
    ///
    /// Clears the pending rule. When nothing qualifies, emits
    /// `NoDestinationsFound` and retries on the next changed batch.
    pub fn select_fallback(&mut self, exclude: Option<&DestinationKey>) -> Option<DestinationKey> {
        let unmatched_rule = self.rule.take();
        let candidates: Vec<&Destination> = self.destinations.values().collect();
        let choice = self
            .fallback
            .choose(&candidates, unmatched_rule.as_ref(), exclude);

        let Some((key, why)) = choice else {
            info!(count = self.destinations.len(), "no fallback destination available");
            self.fallback_owed = true;
            self.bus.emit(DestinationEvent::NoDestinationsFound);
            return None;
        };

        match why {
            FallbackChoice::SystemDefault => info!(key = %key, "falling back to system default"),
            FallbackChoice::SaveToFile => info!(key = %key, "falling back to save-to-file"),
            FallbackChoice::FirstInserted => {
                info!(key = %key, "falling back to first discovered destination")
            }
        }

        self.fallback_owed = false;
        match self.select(Some(&key)) {
            Ok(()) => Some(key),
            Err(err) => {
                error!(error = %err, "fallback selection rejected");
                None
            }
        }
    }
}
