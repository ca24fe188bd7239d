use serde::{Deserialize, Serialize};

use super::{ConnectionStatus, DestinationKey, Origin, ProvisionalType};

/// Capabilities document reported by a destination's backend.
///
/// The shape is owned by the printing backend; the core only cares whether it
/// is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(pub serde_json::Value);

impl Capabilities {
    pub fn new(document: serde_json::Value) -> Self {
        Self(document)
    }

    pub fn document(&self) -> &serde_json::Value {
        &self.0
    }
}

/// One addressable print target.
///
/// 一个可寻址的打印目标。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub origin: Origin,
    pub account: String,
    pub display_name: String,
    pub connection_status: ConnectionStatus,
    pub capabilities: Option<Capabilities>,
    pub is_recent: bool,
    pub is_tos_accepted: bool,
    pub provisional_type: ProvisionalType,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Milliseconds since the epoch when this destination was last selected.
    pub last_access_ms: Option<i64>,
}

impl Destination {
    pub fn new(
        origin: Origin,
        id: impl Into<String>,
        account: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            origin,
            account: account.into(),
            display_name: display_name.into(),
            connection_status: ConnectionStatus::Unknown,
            capabilities: None,
            is_recent: false,
            is_tos_accepted: false,
            provisional_type: ProvisionalType::None,
            description: None,
            location: None,
            last_access_ms: None,
        }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.connection_status = status;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_provisional_type(mut self, provisional_type: ProvisionalType) -> Self {
        self.provisional_type = provisional_type;
        self
    }

    pub fn key(&self) -> DestinationKey {
        DestinationKey::new(self.origin, self.id.clone(), self.account.clone())
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional_type != ProvisionalType::None
    }

    /// Ready to print once the capabilities document has been fetched.
    pub fn has_capabilities(&self) -> bool {
        self.capabilities.is_some()
    }

    /// Copy the fields a later report is allowed to change.
    ///
    /// Identity fields and local bookkeeping (`is_recent`, `last_access_ms`) are
    /// left alone; an absent capabilities document never erases a fetched one.
    pub fn merge_mutable_fields(&mut self, incoming: &Destination) {
        self.display_name = incoming.display_name.clone();
        self.connection_status = incoming.connection_status;
        if incoming.capabilities.is_some() {
            self.capabilities = incoming.capabilities.clone();
        }
        self.is_tos_accepted = incoming.is_tos_accepted;
        self.provisional_type = incoming.provisional_type;
        self.description = incoming.description.clone();
        self.location = incoming.location.clone();
    }
}

/// Destination as reported by a discovery collaborator.
///
/// The origin is implied by the feed that delivered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationDescriptor {
    pub id: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub connection_status: ConnectionStatus,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub is_tos_accepted: bool,
    #[serde(default)]
    pub provisional_type: ProvisionalType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl DestinationDescriptor {
    pub fn into_destination(self, origin: Origin) -> Destination {
        let display_name = if self.display_name.is_empty() {
            self.id.clone()
        } else {
            self.display_name
        };
        Destination {
            id: self.id,
            origin,
            account: self.account,
            display_name,
            connection_status: self.connection_status,
            capabilities: self.capabilities,
            is_recent: false,
            is_tos_accepted: self.is_tos_accepted,
            provisional_type: self.provisional_type,
            description: self.description,
            location: self.location,
            last_access_ms: None,
        }
    }
}
