use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::FetchError,
    hours::normalize_opening_hours,
    model::{COORDINATE_SEPARATOR, ParkingSpot, SpotLocation},
    provider::FetchOutcome,
};

use super::PlacesProvider;

const PLACES_URL: &str = "https://api.geoapify.com/v2/places";

const PARKING_CATEGORIES: &str = "parking.cars";
const RESULT_LIMIT: u32 = 20;
const RECT_FILTER_PREFIX: &str = "rect:";
const EXPECTED_COORDINATE_COUNT: usize = 4;

/// Substring a category must contain for the feature to count as parking.
const PARKING_CATEGORY_MARKER: &str = "parking";
/// Placeholder name some upstream datasources emit for nameless places.
const UNKNOWN_NAME: &str = "Unknown";

const DEFAULT_NAME: &str = "Unknown Parking";
const DEFAULT_ADDRESS: &str = "Unknown Address";
const DEFAULT_CITY: &str = "Unknown City";
const DEFAULT_COUNTRY: &str = "Unknown Country";
const DEFAULT_HOURS: &str = "Not specified";

/// Client for the Geoapify Places API.
///
/// Use [`GeoapifyProvider::new`] for production or
/// [`GeoapifyProvider::with_base_url`] to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct GeoapifyProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl GeoapifyProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, PLACES_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_places(&self, bounding_box: &str) -> FetchOutcome {
        let filter = rect_filter(bounding_box)?;
        let limit = RESULT_LIMIT.to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("categories", PARKING_CATEGORIES),
                ("filter", filter.as_str()),
                ("limit", limit.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::Remote {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let spots = parse_spots(&body)?;
        debug!(count = spots.len(), "fetched parking spots");
        Ok(spots)
    }
}

#[async_trait]
impl PlacesProvider for GeoapifyProvider {
    async fn fetch_spots(&self, bounding_box: &str) -> FetchOutcome {
        self.fetch_places(bounding_box).await
    }
}

/// Reorders the inbound `"neLat,neLng,swLat,swLng"` string into the
/// `rect:minLng,minLat,maxLng,maxLat` filter the endpoint expects.
fn rect_filter(bounding_box: &str) -> Result<String, FetchError> {
    let parts: Vec<&str> = bounding_box.split(COORDINATE_SEPARATOR).collect();
    if parts.len() != EXPECTED_COORDINATE_COUNT {
        return Err(FetchError::invalid_bounding_box());
    }

    let coords = parts
        .iter()
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let (ne_lat, ne_lng, sw_lat, sw_lng) = (coords[0], coords[1], coords[2], coords[3]);
    Ok(format!("{RECT_FILTER_PREFIX}{sw_lng},{sw_lat},{ne_lng},{ne_lat}"))
}

/// The endpoint occasionally answers 200 with no body; that counts as zero
/// features rather than a parse fault.
fn parse_spots(body: &str) -> Result<Vec<ParkingSpot>, FetchError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed: PlacesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Transport(e.to_string()))?;

    debug!(total = parsed.features.len(), "received place features");
    Ok(parsed.features.into_iter().filter_map(map_feature).collect())
}

/// Maps one raw feature to a [`ParkingSpot`], or `None` when it fails
/// validation. Rejection is a filter, not an error.
fn map_feature(feature: Feature) -> Option<ParkingSpot> {
    let props = &feature.properties;

    let is_parking = props
        .categories
        .iter()
        .any(|category| category.contains(PARKING_CATEGORY_MARKER));

    let has_valid_name = props
        .name
        .as_deref()
        .is_some_and(|name| !name.is_empty() && name != UNKNOWN_NAME && !name.trim().is_empty());

    if !is_parking || !has_valid_name {
        return None;
    }

    let opening_hours =
        resolve_opening_hours(props).unwrap_or_else(|| DEFAULT_HOURS.to_string());

    let coordinates = &feature.geometry.coordinates; // [lng, lat]
    let location = SpotLocation {
        latitude: coordinates.get(1).copied().unwrap_or(0.0),
        longitude: coordinates.first().copied().unwrap_or(0.0),
    };

    let props = feature.properties;
    Some(ParkingSpot {
        name: props.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
        location,
        address: props
            .formatted
            .or(props.address_line1)
            .or(props.address_line2)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        city: props.city.unwrap_or_else(|| DEFAULT_CITY.to_string()),
        country: props.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        opening_hours,
    })
}

/// Opening hours resolved from, in order: the direct field, the raw
/// datasource field, a time-range extraction over the raw "charge" text.
fn resolve_opening_hours(props: &Properties) -> Option<String> {
    if let Some(hours) = &props.opening_hours {
        return Some(hours.clone());
    }

    let raw = props.datasource.as_ref()?.raw.as_ref()?;
    if let Some(hours) = &raw.opening_hours {
        return Some(hours.clone());
    }

    let from_charge = normalize_opening_hours(raw.charge.as_deref()?);
    if from_charge.is_empty() {
        None
    } else {
        Some(from_charge)
    }
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    name: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    country: Option<String>,
    formatted: Option<String>,
    opening_hours: Option<String>,
    datasource: Option<Datasource>,
}

#[derive(Debug, Default, Deserialize)]
struct Datasource {
    raw: Option<RawAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    opening_hours: Option<String>,
    charge: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}
