use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::destination::{Destination, Origin};

pub const DEFAULT_SAVE_TO_FILE_ID: &str = "save_as_pdf";
pub const DEFAULT_CLOUD_DOCS_ID: &str = "__google__docs";

/// Per-origin ids of pseudo-destinations that do not produce physical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualDestinations(BTreeMap<Origin, BTreeSet<String>>);

impl VirtualDestinations {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, origin: Origin, id: impl Into<String>) -> Self {
        self.0.entry(origin).or_default().insert(id.into());
        self
    }

    pub fn contains(&self, origin: Origin, id: &str) -> bool {
        self.0.get(&origin).is_some_and(|ids| ids.contains(id))
    }

    pub fn is_virtual(&self, destination: &Destination) -> bool {
        self.contains(destination.origin, &destination.id)
    }
}

impl Default for VirtualDestinations {
    fn default() -> Self {
        Origin::CLOUD.into_iter().fold(
            Self::empty().with(Origin::Local, DEFAULT_SAVE_TO_FILE_ID),
            |virtuals, origin| virtuals.with(origin, DEFAULT_CLOUD_DOCS_ID),
        )
    }
}
