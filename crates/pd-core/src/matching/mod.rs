//! Destination matching: auto-select rules and the virtual destination table.

pub mod match_rule;
pub mod virtuals;

pub use match_rule::MatchRule;
pub use virtuals::{VirtualDestinations, DEFAULT_CLOUD_DOCS_ID, DEFAULT_SAVE_TO_FILE_ID};
