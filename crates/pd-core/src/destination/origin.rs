use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Discovery and transport source of a destination.
///
/// 目标的发现来源与传输方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Origin {
    /// Printers known to the local OS.
    Local,
    /// Local-network printers found via mDNS/privet.
    Privet,
    /// Printers provided by a browser extension.
    Extension,
    /// Cloud printers reached with cookie auth.
    Cookies,
    /// Cloud printers reached with device auth.
    Device,
    /// Cloud printers reached with profile auth.
    Profile,
}

impl Origin {
    pub const ALL: [Origin; 6] = [
        Origin::Local,
        Origin::Privet,
        Origin::Extension,
        Origin::Cookies,
        Origin::Device,
        Origin::Profile,
    ];

    pub const CLOUD: [Origin; 3] = [Origin::Cookies, Origin::Device, Origin::Profile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Privet => "privet",
            Origin::Extension => "extension",
            Origin::Cookies => "cookies",
            Origin::Device => "device",
            Origin::Profile => "profile",
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, Origin::Cookies | Origin::Device | Origin::Profile)
    }

    /// Whether the discovery collaborator for this origin eventually reports
    /// completion. Broadcast discovery never does.
    pub fn has_completion_signal(&self) -> bool {
        !matches!(self, Origin::Privet)
    }

    /// Whether a running search may be restarted to re-query the source.
    pub fn supports_requery(&self) -> bool {
        matches!(self, Origin::Privet | Origin::Extension)
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.as_str().to_string()
    }
}

impl TryFrom<String> for Origin {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::ALL
            .into_iter()
            .find(|origin| origin.as_str() == s)
            .ok_or_else(|| format!("unknown destination origin: {s}"))
    }
}
