//! Fallback selection policy.
//!
//! Discovery never reports "everything has been found", so when the preferred
//! destination does not show up in time the registry falls back to, in order:
//!
//! 1. the system default destination, unless it is what the unmatched rule
//!    was waiting for,
//! 2. the save-to-file pseudo-destination,
//! 3. the last-resort policy (first destination in insertion order by default),
//! 4. nothing.

use serde::{Deserialize, Serialize};

use crate::destination::{Destination, DestinationKey, Origin};
use crate::matching::MatchRule;

/// What to pick when neither the system default nor save-to-file is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastResortPolicy {
    /// First usable destination in insertion order.
    #[default]
    FirstInserted,
    /// Leave the selection empty.
    NoSelection,
}

/// Why a fallback candidate was chosen, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackChoice {
    SystemDefault,
    SaveToFile,
    FirstInserted,
}

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    system_default: Option<DestinationKey>,
    save_to_file: DestinationKey,
    last_resort: LastResortPolicy,
}

impl FallbackPolicy {
    pub fn new(
        system_default_id: Option<&str>,
        save_to_file_id: &str,
        last_resort: LastResortPolicy,
    ) -> Self {
        Self {
            system_default: system_default_id.map(|id| DestinationKey::local(Origin::Local, id)),
            save_to_file: DestinationKey::local(Origin::Local, save_to_file_id),
            last_resort,
        }
    }

    pub fn system_default(&self) -> Option<&DestinationKey> {
        self.system_default.as_ref()
    }

    pub fn save_to_file(&self) -> &DestinationKey {
        &self.save_to_file
    }

    /// Pick a destination among `candidates` (insertion order).
    ///
    /// Provisional destinations and `exclude` are never chosen.
    pub fn choose(
        &self,
        candidates: &[&Destination],
        unmatched_rule: Option<&MatchRule>,
        exclude: Option<&DestinationKey>,
    ) -> Option<(DestinationKey, FallbackChoice)> {
        let usable = |d: &&&Destination| {
            !d.is_provisional() && exclude.is_none_or(|excluded| d.key() != *excluded)
        };
        let find = |key: &DestinationKey| {
            candidates
                .iter()
                .filter(usable)
                .find(|d| d.key() == *key)
                .copied()
        };

        if let Some(default_key) = &self.system_default {
            if let Some(destination) = find(default_key) {
                let is_rule_target = unmatched_rule.is_some_and(|rule| rule.targets(destination));
                if !is_rule_target {
                    return Some((default_key.clone(), FallbackChoice::SystemDefault));
                }
            }
        }

        if find(&self.save_to_file).is_some() {
            return Some((self.save_to_file.clone(), FallbackChoice::SaveToFile));
        }

        match self.last_resort {
            LastResortPolicy::FirstInserted => candidates
                .iter()
                .find(usable)
                .map(|d| (d.key(), FallbackChoice::FirstInserted)),
            LastResortPolicy::NoSelection => None,
        }
    }
}
