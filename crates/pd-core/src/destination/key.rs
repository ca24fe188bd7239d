use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use super::Origin;

/// Composite identity of a destination.
///
/// `id` is only unique within an origin and account, so all three parts
/// together form the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationKey {
    pub origin: Origin,
    pub id: String,
    #[serde(default)]
    pub account: String,
}

impl DestinationKey {
    pub fn new(origin: Origin, id: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            origin,
            id: id.into(),
            account: account.into(),
        }
    }

    /// Key for a destination that needs no signed-in identity.
    pub fn local(origin: Origin, id: impl Into<String>) -> Self {
        Self::new(origin, id, "")
    }
}

impl Display for DestinationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.origin, self.id, self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_differ_by_account() {
        let a = DestinationKey::new(Origin::Cookies, "cloud1", "user@x");
        let b = DestinationKey::new(Origin::Cookies, "cloud1", "other@x");
        assert_ne!(a, b);

        let set: HashSet<_> = [a.clone(), a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_joins_all_parts() {
        let key = DestinationKey::new(Origin::Cookies, "cloud1", "user@x");
        assert_eq!(key.to_string(), "cookies/cloud1/user@x");
        assert_eq!(DestinationKey::local(Origin::Local, "a").to_string(), "local/a/");
    }
}
