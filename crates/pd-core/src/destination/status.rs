use serde::{Deserialize, Serialize};

/// Last known reachability of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn is_known(&self) -> bool {
        !matches!(self, ConnectionStatus::Unknown)
    }
}

/// Pending external step a destination needs before it can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionalType {
    #[default]
    None,
    /// The OS must grant USB access first.
    NeedsUsbPermission,
}
