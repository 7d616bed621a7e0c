//! Core library for the `parkmap` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over the remote place-search service
//! - Opening-hours normalization for free-text schedules
//! - The viewport-driven map session and its concurrency rules
//! - Shared domain models (viewports, parking spots, fault taxonomy)
//!
//! It is used by `parkmap-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod hours;
pub mod location;
pub mod model;
pub mod provider;
pub mod session;

pub use config::{Config, PlacesServiceConfig};
pub use error::{ErrorNotice, FetchError};
pub use location::{Coordinate, LocationProvider, StaticLocation};
pub use model::{ParkingSpot, SpotLocation, ViewportBox};
pub use provider::{FetchOutcome, PlacesProvider, provider_from_config};
pub use session::{MapSession, MapSignals, MapState};
