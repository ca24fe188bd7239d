use std::collections::BTreeMap;

use super::model::*;
use crate::destination::Origin;
use crate::matching::{VirtualDestinations, DEFAULT_SAVE_TO_FILE_ID};
use crate::selection::{LastResortPolicy, DEFAULT_MAX_RECENT};

pub const DEFAULT_AUTO_SELECT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_PRIVET_SEARCH_MS: u64 = 5_000;
pub const DEFAULT_EXTENSION_SEARCH_MS: u64 = 5_000;

impl Default for DestinationSettings {
    fn default() -> Self {
        Self {
            auto_select_timeout_ms: DEFAULT_AUTO_SELECT_TIMEOUT_MS,
            discovery_deadline_ms: BTreeMap::from([
                (Origin::Privet, DEFAULT_PRIVET_SEARCH_MS),
                (Origin::Extension, DEFAULT_EXTENSION_SEARCH_MS),
            ]),
            virtual_destinations: VirtualDestinations::default(),
            save_to_file_id: DEFAULT_SAVE_TO_FILE_ID.to_string(),
            system_default_id: None,
            default_selection_rules: None,
            last_resort: LastResortPolicy::FirstInserted,
            max_recent: DEFAULT_MAX_RECENT,
            default_origins: vec![Origin::Local],
        }
    }
}
