use serde::{Deserialize, Serialize};

/// Separator used when a viewport is flattened into a bounding-box string.
pub const COORDINATE_SEPARATOR: &str = ",";

/// Geographic rectangle currently visible on the map surface.
///
/// Invariant: `ne_lat >= sw_lat`. Longitudes are unconstrained and may wrap.
/// Compared structurally to suppress redundant fetches for a camera that
/// settles on the same rectangle twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBox {
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub sw_lat: f64,
    pub sw_lng: f64,
}

impl ViewportBox {
    pub fn new(ne_lat: f64, ne_lng: f64, sw_lat: f64, sw_lng: f64) -> Self {
        Self { ne_lat, ne_lng, sw_lat, sw_lng }
    }

    /// Flattens the box into the `"neLat,neLng,swLat,swLng"` string the
    /// fetch layer consumes.
    pub fn to_bounding_box(&self) -> String {
        [self.ne_lat, self.ne_lng, self.sw_lat, self.sw_lng]
            .map(|c| c.to_string())
            .join(COORDINATE_SEPARATOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotLocation {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

/// One parking facility as shown on the map. Identity is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub name: String,
    pub location: SpotLocation,
    pub address: String,
    pub city: String,
    pub country: String,
    pub opening_hours: String,
}
