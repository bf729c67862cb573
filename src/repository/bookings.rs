//! Bookings repository

use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::booking::{Booking, CreateBooking, UpdateBooking},
};

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Booking>> {
        Ok(sqlx::query_as::<_, Booking>("SELECT * FROM bookings ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No booking found with that ID".to_string()))
    }

    pub async fn create(&self, data: &CreateBooking) -> AppResult<Booking> {
        Ok(sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, tour_id, user_id, price, paid)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tour)
        .bind(data.user)
        .bind(data.price)
        .bind(data.paid.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn update(&self, id: Uuid, data: &UpdateBooking) -> AppResult<Booking> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE bookings SET id = id");
        if let Some(price) = data.price {
            qb.push(", price = ").push_bind(price);
        }
        if let Some(paid) = data.paid {
            qb.push(", paid = ").push_bind(paid);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        qb.build_query_as::<Booking>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No booking found with that ID".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No booking found with that ID".to_string()));
        }
        Ok(())
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM bookings").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
