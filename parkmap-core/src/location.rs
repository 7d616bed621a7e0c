//! Port for the host's location service.

use std::fmt::Debug;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Source of a best-effort last-known position, used once at session start
/// to aim the initial camera move.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    /// `Ok(None)` means no fix is currently available; both that and `Err`
    /// are reported to the user as a location failure, never a crash.
    async fn last_known_location(&self) -> anyhow::Result<Option<Coordinate>>;
}

/// Fixed location source for hosts without a live location service.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub Option<Coordinate>);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn last_known_location(&self) -> anyhow::Result<Option<Coordinate>> {
        Ok(self.0)
    }
}
