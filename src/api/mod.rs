//! API handlers for Natours REST endpoints

pub mod bookings;
pub mod health;
pub mod openapi;
pub mod reviews;
pub mod tours;
pub mod users;

use std::collections::BTreeMap;

use axum::extract::{FromRequest, FromRequestParts};
use serde::Serialize;

use crate::error::AppError;

/// JSON body extractor rejecting with the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor rejecting with the API error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor rejecting with the API error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Success body: `{"status": "success", "results": n, "data": {key: value}}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: BTreeMap<&'static str, T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(key: &'static str, value: T) -> Self {
        Self {
            status: "success",
            results: None,
            data: BTreeMap::from([(key, value)]),
        }
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    /// Envelope for a list, `results` carrying its length
    pub fn list(key: &'static str, values: Vec<T>) -> Self {
        Self {
            status: "success",
            results: Some(values.len()),
            data: BTreeMap::from([(key, values)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let one = serde_json::to_value(Envelope::new("tour", json!({"name": "x"}))).unwrap();
        assert_eq!(one, json!({"status": "success", "data": {"tour": {"name": "x"}}}));

        let many = serde_json::to_value(Envelope::list("tours", vec![1, 2, 3])).unwrap();
        assert_eq!(
            many,
            json!({"status": "success", "results": 3, "data": {"tours": [1, 2, 3]}})
        );
    }
}
