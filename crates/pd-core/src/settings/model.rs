use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::destination::Origin;
use crate::matching::VirtualDestinations;
use crate::selection::LastResortPolicy;

/// Tunables for discovery and selection.
///
/// 打印目标发现与选择的配置项。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationSettings {
    /// Upper bound on waiting for the preferred destination before falling back.
    pub auto_select_timeout_ms: u64,

    /// Forced-completion deadline per origin. Origins without an entry only
    /// finish on the collaborator's signal.
    pub discovery_deadline_ms: BTreeMap<Origin, u64>,

    /// Ids of pseudo-destinations per origin.
    pub virtual_destinations: VirtualDestinations,

    /// Id of the local save-to-file pseudo-destination.
    pub save_to_file_id: String,

    /// Id of the OS default printer, if the host knows it.
    pub system_default_id: Option<String>,

    /// Serialized default-selection rules injected by the host.
    pub default_selection_rules: Option<String>,

    pub last_resort: LastResortPolicy,

    pub max_recent: usize,

    /// Origins searched at startup when no rule names any.
    pub default_origins: Vec<Origin>,
}

impl DestinationSettings {
    pub fn auto_select_timeout(&self) -> Duration {
        Duration::from_millis(self.auto_select_timeout_ms)
    }

    pub fn discovery_deadline(&self, origin: Origin) -> Option<Duration> {
        self.discovery_deadline_ms
            .get(&origin)
            .copied()
            .map(Duration::from_millis)
    }
}
