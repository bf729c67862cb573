//! Booking model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    #[serde(rename = "tour")]
    pub tour_id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub paid: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBooking {
    pub tour: Uuid,
    pub user: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub paid: Option<bool>,
}

impl CreateBooking {
    pub fn checked(self) -> AppResult<Self> {
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Booking must have a positive price".to_string(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateBooking {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub paid: Option<bool>,
}

impl UpdateBooking {
    pub fn checked(self) -> AppResult<Self> {
        if matches!(self.price, Some(p) if p <= Decimal::ZERO) {
            return Err(AppError::Validation(
                "Booking must have a positive price".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_price_must_be_positive() {
        let booking = CreateBooking {
            tour: Uuid::new_v4(),
            user: Uuid::new_v4(),
            price: Decimal::ZERO,
            paid: None,
        };
        assert!(booking.checked().is_err());

        let update = UpdateBooking {
            price: Some(Decimal::from(-1)),
            paid: None,
        };
        assert!(update.checked().is_err());
        assert!(UpdateBooking::default().checked().is_ok());
    }
}
