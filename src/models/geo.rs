//! GeoJSON points embedded in tours

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Mean earth radius in miles
const EARTH_RADIUS_MI: f64 = 3963.2;
/// Mean earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6378.1;

/// GeoJSON geometry type; tours only store points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PointKind {
    #[default]
    Point,
}

/// A GeoJSON point with a human readable address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: PointKind,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    pub address: Option<String>,
    pub description: Option<String>,
}

impl GeoPoint {
    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn validate_coordinates(&self) -> AppResult<()> {
        let (lng, lat) = (self.longitude(), self.latitude());
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!(
                "Invalid coordinates [{}, {}]",
                lng, lat
            )));
        }
        Ok(())
    }
}

/// A stop on the tour itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    #[serde(flatten)]
    pub point: GeoPoint,
    /// Day of the tour on which this stop is visited
    pub day: Option<i32>,
}

/// Unit used for geospatial queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    /// Anything other than `mi` is treated as kilometers
    pub fn parse(unit: &str) -> Self {
        if unit == "mi" {
            DistanceUnit::Miles
        } else {
            DistanceUnit::Kilometers
        }
    }

    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MI,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Convert a distance in this unit to radians on the sphere
    pub fn to_radians(self, distance: f64) -> f64 {
        distance / self.earth_radius()
    }
}

/// A `lat,lng` pair taken from the request path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl std::str::FromStr for LatLng {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            AppError::BadRequest(
                "Please provide latitude and longitude in the format lat,lng.".to_string(),
            )
        };
        let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(LatLng { lat, lng })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latlng() {
        let p: LatLng = "34.111745,-118.113491".parse().unwrap();
        assert_eq!(p.lat, 34.111745);
        assert_eq!(p.lng, -118.113491);
    }

    #[test]
    fn test_parse_latlng_rejects_garbage() {
        assert!("34.1".parse::<LatLng>().is_err());
        assert!("abc,def".parse::<LatLng>().is_err());
        assert!("95,10".parse::<LatLng>().is_err());
    }

    #[test]
    fn test_distance_unit() {
        assert_eq!(DistanceUnit::parse("mi"), DistanceUnit::Miles);
        assert_eq!(DistanceUnit::parse("km"), DistanceUnit::Kilometers);
        assert_eq!(DistanceUnit::parse("furlong"), DistanceUnit::Kilometers);
        assert!((DistanceUnit::Miles.to_radians(3963.2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_json_shape() {
        let json = serde_json::json!({
            "coordinates": [-80.185942, 25.774772],
            "address": "301 Biscayne Blvd, Miami, FL 33132, USA",
            "description": "Miami, USA",
            "day": 1
        });
        let loc: Location = serde_json::from_value(json).unwrap();
        assert_eq!(loc.point.kind, PointKind::Point);
        assert_eq!(loc.point.latitude(), 25.774772);
        assert_eq!(loc.day, Some(1));

        let out = serde_json::to_value(&loc).unwrap();
        assert_eq!(out["type"], "Point");
    }
}
