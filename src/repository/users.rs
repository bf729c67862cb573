//! Users repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, UpdateUser, User},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List users ordered by name
    pub async fn list(&self) -> AppResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    /// Insert a user; `password_hash` must already be hashed
    pub async fn insert(&self, id: Uuid, data: &CreateUser, password_hash: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, photo, role, password)
            VALUES ($1, $2, $3, COALESCE($4, 'default.jpg'), $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.photo)
        .bind(data.role)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Update a user, bumping its version
    pub async fn update(&self, id: Uuid, data: &UpdateUser) -> AppResult<User> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET version = version + 1");

        macro_rules! set_f {
            ($field:expr, $column:literal) => {
                if let Some(ref val) = $field {
                    qb.push(concat!(", ", $column, " = ")).push_bind(val.clone());
                }
            };
        }

        set_f!(data.name, "name");
        set_f!(data.email, "email");
        set_f!(data.photo, "photo");
        set_f!(data.role, "role");
        set_f!(data.active, "active");

        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        qb.build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    /// Delete a user
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No user found with that ID".to_string()));
        }
        Ok(())
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
