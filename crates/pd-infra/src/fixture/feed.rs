//! Recorded discovery results replayed through the inbound channel.
//!
//! ```json
//! {
//!   "origins": {
//!     "local":  { "delayMs": 20, "destinations": [{"id": "hp", "connectionStatus": "online"}] },
//!     "privet": { "delayMs": 300, "destinations": [], "signalsDone": false }
//!   },
//!   "capabilities": [
//!     { "origin": "local", "id": "hp", "capabilities": {"printer": {}} },
//!     { "origin": "privet", "id": "office", "error": "offline" }
//!   ],
//!   "provisional": [
//!     { "origin": "extension", "id": "usb", "resolved": {"id": "usb-1234"} }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pd_core::ports::{CapabilitiesPort, DiscoveryPort, ProvisionalResolverPort};
use pd_core::{
    Capabilities, DestinationDescriptor, DestinationKey, InboundEvent, Origin,
};
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub origins: BTreeMap<Origin, OriginFixture>,
    #[serde(default)]
    pub capabilities: Vec<CapabilitiesFixture>,
    #[serde(default)]
    pub provisional: Vec<ProvisionalFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginFixture {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub destinations: Vec<DestinationDescriptor>,
    /// Whether the source reports completion after its results.
    #[serde(default = "signals_done_default")]
    pub signals_done: bool,
}

fn signals_done_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesFixture {
    #[serde(flatten)]
    pub key: DestinationKey,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalFixture {
    #[serde(flatten)]
    pub key: DestinationKey,
    #[serde(default)]
    pub delay_ms: u64,
    /// `None` replays a failed resolution.
    #[serde(default)]
    pub resolved: Option<DestinationDescriptor>,
}

/// Discovery, capabilities and provisional-resolution collaborator that
/// answers from a [`Fixture`].
pub struct FixtureFeed {
    fixture: Fixture,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    runtime: Handle,
}

impl FixtureFeed {
    pub fn new(
        fixture: Fixture,
        runtime: Handle,
        inbound: mpsc::UnboundedSender<InboundEvent>,
    ) -> Self {
        Self {
            fixture,
            inbound,
            runtime,
        }
    }

    pub fn load(
        path: &Path,
        runtime: Handle,
        inbound: mpsc::UnboundedSender<InboundEvent>,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.display()))?;
        Ok(Self::new(fixture, runtime, inbound))
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn post_after(&self, delay_ms: u64, events: Vec<InboundEvent>) {
        let inbound = self.inbound.clone();
        self.runtime.spawn(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            for event in events {
                if inbound.send(event).is_err() {
                    debug!("fixture event dropped, inbound channel closed");
                    return;
                }
            }
        });
    }
}

impl DiscoveryPort for FixtureFeed {
    fn start_discovery(&self, origin: Origin) -> Result<()> {
        let Some(source) = self.fixture.origins.get(&origin) else {
            bail!("no discovery source for origin {origin}");
        };

        let mut events = vec![InboundEvent::DestinationsFound {
            origin,
            destinations: source.destinations.clone(),
        }];
        if source.signals_done {
            events.push(InboundEvent::DiscoveryDone { origin });
        }
        debug!(%origin, count = source.destinations.len(), "replaying discovery");
        self.post_after(source.delay_ms, events);
        Ok(())
    }
}

impl CapabilitiesPort for FixtureFeed {
    fn fetch_capabilities(&self, key: &DestinationKey) -> Result<()> {
        let Some(entry) = self.fixture.capabilities.iter().find(|c| c.key == *key) else {
            bail!("no capabilities recorded for {key}");
        };

        let event = match (&entry.capabilities, &entry.error) {
            (Some(capabilities), None) => InboundEvent::CapabilitiesReady {
                key: key.clone(),
                capabilities: capabilities.clone(),
            },
            (_, Some(reason)) => InboundEvent::CapabilitiesFailed {
                key: key.clone(),
                reason: reason.clone(),
            },
            (None, None) => {
                warn!(key = %key, "capabilities entry has neither a document nor an error");
                InboundEvent::CapabilitiesFailed {
                    key: key.clone(),
                    reason: "empty capabilities".to_string(),
                }
            }
        };
        self.post_after(entry.delay_ms, vec![event]);
        Ok(())
    }
}

impl ProvisionalResolverPort for FixtureFeed {
    fn resolve_provisional(&self, key: &DestinationKey) -> Result<()> {
        let Some(entry) = self.fixture.provisional.iter().find(|p| p.key == *key) else {
            bail!("no resolution recorded for {key}");
        };

        let event = match &entry.resolved {
            Some(destination) => InboundEvent::ProvisionalResolved {
                key: key.clone(),
                destination: destination.clone(),
            },
            None => InboundEvent::ProvisionalFailed { key: key.clone() },
        };
        self.post_after(entry.delay_ms, vec![event]);
        Ok(())
    }
}
