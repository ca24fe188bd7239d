//! # pd-core
//!
//! Core domain models and selection logic for print destinations.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

pub mod destination;
pub mod discovery;
pub mod error;
pub mod events;
pub mod matching;
pub mod ports;
pub mod selection;
pub mod settings;

pub use destination::{
    Capabilities, ConnectionStatus, Destination, DestinationDescriptor, DestinationKey, Origin,
    ProvisionalType,
};
pub use error::{RuleError, SelectError};
pub use events::{DestinationEvent, InboundEvent, TimerToken};
pub use matching::{MatchRule, VirtualDestinations};
pub use settings::DestinationSettings;
