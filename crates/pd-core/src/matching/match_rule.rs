//! Auto-select predicate over destinations.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

use super::VirtualDestinations;
use crate::destination::{Destination, Origin};
use crate::error::RuleError;

/// Immutable predicate describing which destination should be auto-selected.
///
/// 自动选择规则：描述应自动选中哪个打印目标。
#[derive(Debug, Clone)]
pub struct MatchRule {
    origins: BTreeSet<Origin>,
    exact_id: Option<String>,
    id_pattern: Option<Regex>,
    display_name_pattern: Option<Regex>,
    exclude_virtual: bool,
    virtuals: VirtualDestinations,
}

/// Wire shape of the injected default-selection configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefaultSelectionRules {
    kind: Option<String>,
    id_pattern: Option<String>,
    name_pattern: Option<String>,
}

impl MatchRule {
    pub fn new(
        origins: impl IntoIterator<Item = Origin>,
        id_pattern: Option<Regex>,
        display_name_pattern: Option<Regex>,
        exclude_virtual: bool,
        virtuals: VirtualDestinations,
    ) -> Self {
        Self {
            origins: origins.into_iter().collect(),
            exact_id: None,
            id_pattern,
            display_name_pattern,
            exclude_virtual,
            virtuals,
        }
    }

    /// Rule that matches exactly one previously selected destination.
    ///
    /// The id is compared verbatim, never compiled into a pattern.
    pub fn exact(origin: Origin, id: &str, virtuals: VirtualDestinations) -> Self {
        Self {
            exact_id: Some(id.to_string()),
            ..Self::new([origin], None, None, false, virtuals)
        }
    }

    /// Build a rule from the serialized default-selection configuration.
    ///
    /// ```json
    /// {"kind": "local", "idPattern": "^HP", "namePattern": "Office"}
    /// ```
    ///
    /// A missing `kind` allows every origin. Virtual destinations never satisfy
    /// a configured default.
    pub fn from_default_rules_json(
        json: &str,
        virtuals: VirtualDestinations,
    ) -> Result<Self, RuleError> {
        let rules: DefaultSelectionRules = serde_json::from_str(json)?;

        let origins: Vec<Origin> = match rules.kind.as_deref() {
            None => Origin::ALL.to_vec(),
            Some("local") => vec![Origin::Local],
            Some("cloud") => Origin::CLOUD.to_vec(),
            Some("privet") => vec![Origin::Privet],
            Some("extension") => vec![Origin::Extension],
            Some(other) => return Err(RuleError::UnknownKind(other.to_string())),
        };

        let compile = |field: &'static str, pattern: Option<String>| {
            pattern
                .map(|p| Regex::new(&p).map_err(|source| RuleError::Pattern { field, source }))
                .transpose()
        };

        Ok(Self::new(
            origins,
            compile("id", rules.id_pattern)?,
            compile("name", rules.name_pattern)?,
            true,
            virtuals,
        ))
    }

    pub fn origins(&self) -> &BTreeSet<Origin> {
        &self.origins
    }

    pub fn mentions(&self, origin: Origin) -> bool {
        self.origins.contains(&origin)
    }

    pub fn matches(&self, candidate: &Destination) -> bool {
        if !self.origins.contains(&candidate.origin) {
            return false;
        }
        if self.exact_id.as_ref().is_some_and(|id| *id != candidate.id) {
            return false;
        }
        if let Some(pattern) = &self.id_pattern {
            if !pattern.is_match(&candidate.id) {
                return false;
            }
        }
        if let Some(pattern) = &self.display_name_pattern {
            if !pattern.is_match(&candidate.display_name) {
                return false;
            }
        }
        !(self.exclude_virtual && self.virtuals.is_virtual(candidate))
    }

    /// Whether `destination` is what this rule is waiting for.
    pub fn targets(&self, destination: &Destination) -> bool {
        self.matches(destination)
    }
}
