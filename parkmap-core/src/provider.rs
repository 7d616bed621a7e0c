use std::fmt::Debug;

use async_trait::async_trait;

use crate::{Config, error::FetchError, model::ParkingSpot, provider::geoapify::GeoapifyProvider};

pub mod geoapify;

/// Result of one fetch attempt: the mapped spots in source order, or the
/// classified failure. Faults are values handed back to the caller; nothing
/// at this layer panics or retries.
pub type FetchOutcome = Result<Vec<ParkingSpot>, FetchError>;

#[async_trait]
pub trait PlacesProvider: Send + Sync + Debug {
    /// Fetches parking spots inside `bounding_box`, a comma-separated
    /// `"neLat,neLng,swLat,swLng"` rectangle.
    async fn fetch_spots(&self, bounding_box: &str) -> FetchOutcome;
}

/// Construct the places provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn PlacesProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for the places service.\n\
             Hint: run `parkmap configure` and enter your Geoapify API key."
        )
    })?;

    Ok(Box::new(GeoapifyProvider::new(api_key.to_owned())))
}
