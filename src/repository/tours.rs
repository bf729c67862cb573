//! Tours repository.
//!
//! All tour data access goes through here, and the steps that keep tours
//! consistent are applied explicitly, in this order:
//!
//! - writes: slug derived from the (already normalized) name, then persisted
//! - reads: secrecy filter added to the statement, then guides resolved
//! - aggregations: secrecy filter prepended when the pipeline starts with a match

use std::collections::HashMap;

use sqlx::{types::Json, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    filter::{push_conditions, push_order_by},
    pipeline::{ColumnKind, Pipeline, Source, Stage},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        filter::Filter,
        geo::{DistanceUnit, LatLng},
        tour::{
            ratings_from_reviews, slugify, CreateTour, Tour, TourDistance, TourQuery, TourRow,
            UpdateTour, DEFAULT_RATINGS_AVERAGE,
        },
        user::GuideSummary,
    },
};

/// Predicate hiding secret tours from every read-style statement
const VISIBLE: &str = "NOT secret_tour";

/// Central angle between `start_location` and the point (`$1` lat, `$2` lng), in radians
const ANGULAR_DISTANCE: &str = "2 * asin(least(1, sqrt(\
    power(sin(radians(((start_location->'coordinates'->>1)::float8 - $1) / 2)), 2) \
    + cos(radians($1)) * cos(radians((start_location->'coordinates'->>1)::float8)) \
    * power(sin(radians(((start_location->'coordinates'->>0)::float8 - $2) / 2)), 2))))";

/// Tour columns exposed to aggregation pipelines
pub const TOUR_SOURCE: Source = Source {
    table: "tours",
    columns: &[
        ("id", "id", ColumnKind::Scalar),
        ("name", "name", ColumnKind::Scalar),
        ("slug", "slug", ColumnKind::Scalar),
        ("duration", "duration", ColumnKind::Scalar),
        ("max_group_size", "maxGroupSize", ColumnKind::Scalar),
        ("difficulty", "difficulty", ColumnKind::Scalar),
        ("ratings_average", "ratingsAverage", ColumnKind::Scalar),
        ("ratings_quantity", "ratingsQuantity", ColumnKind::Scalar),
        ("price", "price", ColumnKind::Scalar),
        ("price_discount", "priceDiscount", ColumnKind::Scalar),
        ("summary", "summary", ColumnKind::Scalar),
        ("description", "description", ColumnKind::Scalar),
        ("image_cover", "imageCover", ColumnKind::Scalar),
        ("images", "images", ColumnKind::Array),
        ("created_at", "createdAt", ColumnKind::Scalar),
        ("start_dates", "startDates", ColumnKind::Array),
        ("secret_tour", "secretTour", ColumnKind::Scalar),
        ("start_location", "startLocation", ColumnKind::Scalar),
        ("locations", "locations", ColumnKind::Scalar),
        ("guides", "guides", ColumnKind::Array),
    ],
};

/// Start a read-style statement on tours, secret tours already excluded
fn visible_tours(select: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM tours WHERE ").push(VISIBLE);
    qb
}

/// Prepend the secrecy filter iff the pipeline starts with a match stage.
///
/// Pipelines starting with any other stage run unfiltered.
pub fn with_secrecy_guard(pipeline: Pipeline) -> Pipeline {
    if matches!(pipeline.first(), Some(Stage::Match(_))) {
        pipeline.prepend(Stage::Match(Filter::new().ne("secretTour", true)))
    } else {
        pipeline
    }
}

#[derive(Clone)]
pub struct ToursRepository {
    pool: Pool<Postgres>,
}

impl ToursRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Resolve guide identifiers of the given rows against the current users table
    async fn populate_guides(&self, rows: Vec<TourRow>) -> AppResult<Vec<Tour>> {
        let mut ids: Vec<Uuid> = rows.iter().flat_map(|r| r.guides.iter().copied()).collect();
        ids.sort();
        ids.dedup();

        let guides: HashMap<Uuid, GuideSummary> = if ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, GuideSummary>(
                "SELECT id, name, email, photo, role FROM users WHERE id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect()
        };

        Ok(rows.into_iter().map(|r| r.into_tour(&guides)).collect())
    }

    async fn populate_one(&self, row: TourRow) -> AppResult<Tour> {
        self.populate_guides(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Guide resolution lost a tour".to_string()))
    }

    /// List visible tours with filters, sorting and pagination
    pub async fn list(&self, query: &TourQuery) -> AppResult<Vec<Tour>> {
        let mut qb = visible_tours("SELECT *");
        push_conditions(&mut qb, &query.filter);
        push_order_by(&mut qb, &query.sort);
        qb.push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset()?);

        let rows = qb.build_query_as::<TourRow>().fetch_all(&self.pool).await?;
        self.populate_guides(rows).await
    }

    /// Get a visible tour by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Tour> {
        let mut qb = visible_tours("SELECT *");
        qb.push(" AND id = ").push_bind(id);

        let row = qb
            .build_query_as::<TourRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No tour found with that ID".to_string()))?;
        self.populate_one(row).await
    }

    /// Insert a validated tour under a fresh ID
    pub async fn create(&self, data: &CreateTour) -> AppResult<Tour> {
        self.insert(Uuid::new_v4(), data).await
    }

    /// Insert a validated tour under a caller provided ID (seed data)
    pub async fn insert(&self, id: Uuid, data: &CreateTour) -> AppResult<Tour> {
        let slug = slugify(&data.name);

        let row = sqlx::query_as::<_, TourRow>(
            r#"
            INSERT INTO tours (
                id, name, slug, duration, max_group_size, difficulty,
                ratings_average, ratings_quantity, price, price_discount,
                summary, description, image_cover, images, start_dates,
                secret_tour, start_location, locations, guides
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&slug)
        .bind(data.duration)
        .bind(data.max_group_size)
        .bind(data.difficulty)
        .bind(data.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE))
        .bind(data.ratings_quantity.unwrap_or(0))
        .bind(data.price)
        .bind(data.price_discount)
        .bind(&data.summary)
        .bind(&data.description)
        .bind(&data.image_cover)
        .bind(&data.images)
        .bind(&data.start_dates)
        .bind(data.secret_tour)
        .bind(data.start_location.as_ref().map(Json))
        .bind(Json(&data.locations))
        .bind(&data.guides)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(tour_id = %row.id, slug = %row.slug, "Tour created");
        self.populate_one(row).await
    }

    /// Update a visible tour. A new name re-derives the slug.
    pub async fn update(&self, id: Uuid, data: &UpdateTour) -> AppResult<Tour> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tours SET ");
        let mut has_changes = false;
        {
            let mut sets = qb.separated(", ");

            macro_rules! set_f {
                ($field:expr, $column:literal) => {
                    if let Some(ref val) = $field {
                        sets.push(concat!($column, " = "));
                        sets.push_bind_unseparated(val.clone());
                        has_changes = true;
                    }
                };
            }

            set_f!(data.name, "name");
            if let Some(ref name) = data.name {
                sets.push("slug = ");
                sets.push_bind_unseparated(slugify(name));
            }
            set_f!(data.duration, "duration");
            set_f!(data.max_group_size, "max_group_size");
            set_f!(data.difficulty, "difficulty");
            set_f!(data.ratings_average, "ratings_average");
            set_f!(data.ratings_quantity, "ratings_quantity");
            set_f!(data.price, "price");
            set_f!(data.price_discount, "price_discount");
            set_f!(data.summary, "summary");
            set_f!(data.description, "description");
            set_f!(data.image_cover, "image_cover");
            set_f!(data.images, "images");
            set_f!(data.start_dates, "start_dates");
            set_f!(data.secret_tour, "secret_tour");
            set_f!(data.guides, "guides");
            if let Some(ref start) = data.start_location {
                sets.push("start_location = ");
                sets.push_bind_unseparated(Json(start.clone()));
                has_changes = true;
            }
            if let Some(ref locations) = data.locations {
                sets.push("locations = ");
                sets.push_bind_unseparated(Json(locations.clone()));
                has_changes = true;
            }
        }

        if !has_changes {
            return self.get_by_id(id).await;
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND ")
            .push(VISIBLE)
            .push(" RETURNING *");

        let row = qb
            .build_query_as::<TourRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No tour found with that ID".to_string()))?;
        self.populate_one(row).await
    }

    /// Delete a visible tour
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(&format!("DELETE FROM tours WHERE id = $1 AND {}", VISIBLE))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No tour found with that ID".to_string()));
        }
        Ok(())
    }

    /// Store review statistics on a visible tour. Secret tours are left untouched.
    pub async fn update_ratings(&self, id: Uuid, quantity: i64, average: Option<f64>) -> AppResult<()> {
        let (quantity, average) = ratings_from_reviews(quantity, average)?;

        sqlx::query(&format!(
            "UPDATE tours SET ratings_quantity = $1, ratings_average = $2 WHERE id = $3 AND {}",
            VISIBLE
        ))
        .bind(quantity)
        .bind(average)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Run an aggregation pipeline over tours
    pub async fn aggregate(&self, pipeline: Pipeline) -> AppResult<Vec<serde_json::Value>> {
        let compiled = with_secrecy_guard(pipeline).compile(&TOUR_SOURCE)?;
        tracing::debug!(sql = %compiled.sql, "Running tour aggregation");
        compiled.fetch_all(&self.pool).await
    }

    /// Visible tours starting within `distance` of `center`
    pub async fn within(&self, center: LatLng, distance: f64, unit: DistanceUnit) -> AppResult<Vec<Tour>> {
        let sql = format!(
            "SELECT * FROM tours WHERE {} AND start_location IS NOT NULL AND {} <= $3",
            VISIBLE, ANGULAR_DISTANCE
        );
        let rows = sqlx::query_as::<_, TourRow>(&sql)
            .bind(center.lat)
            .bind(center.lng)
            .bind(unit.to_radians(distance))
            .fetch_all(&self.pool)
            .await?;
        self.populate_guides(rows).await
    }

    /// Distance from `center` to the start of every visible tour, nearest first
    pub async fn distances(&self, center: LatLng, unit: DistanceUnit) -> AppResult<Vec<TourDistance>> {
        let sql = format!(
            "SELECT id, name, {} * $3 AS distance FROM tours \
             WHERE {} AND start_location IS NOT NULL ORDER BY distance",
            ANGULAR_DISTANCE, VISIBLE
        );
        Ok(sqlx::query_as::<_, TourDistance>(&sql)
            .bind(center.lat)
            .bind(center.lng)
            .bind(unit.earth_radius())
            .fetch_all(&self.pool)
            .await?)
    }

    /// Remove every tour, secret ones included (seed data reset)
    pub async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM tours").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::{CompareOp, Direction, FilterValue};
    use crate::repository::pipeline::{Accumulator, Group, GroupKey};

    #[test]
    fn test_guard_prepends_before_match() {
        let pipeline = Pipeline::new().filter(Filter::new().gte("ratingsAverage", 4.5));
        let guarded = with_secrecy_guard(pipeline);

        assert_eq!(guarded.stages().len(), 2);
        match &guarded.stages()[0] {
            Stage::Match(filter) => {
                assert_eq!(filter.conditions.len(), 1);
                assert_eq!(filter.conditions[0].field, "secretTour");
                assert_eq!(filter.conditions[0].op, CompareOp::Ne);
                assert_eq!(filter.conditions[0].value, FilterValue::Bool(true));
            }
            other => panic!("unexpected first stage {:?}", other),
        }
        match &guarded.stages()[1] {
            Stage::Match(filter) => assert_eq!(filter.conditions[0].field, "ratingsAverage"),
            other => panic!("unexpected second stage {:?}", other),
        }
    }

    #[test]
    fn test_guard_skips_pipeline_starting_with_group() {
        let pipeline = Pipeline::new()
            .group(Group::by(GroupKey::Field("difficulty".into())).field("n", Accumulator::Count));
        let guarded = with_secrecy_guard(pipeline.clone());
        assert_eq!(guarded, pipeline);
    }

    #[test]
    fn test_guard_skips_unwind_and_empty() {
        let pipeline = Pipeline::new().unwind("startDates");
        assert_eq!(with_secrecy_guard(pipeline.clone()), pipeline);
        assert_eq!(with_secrecy_guard(Pipeline::new()), Pipeline::new());
    }

    #[test]
    fn test_guarded_pipeline_compiles_secrecy_first() {
        let compiled = with_secrecy_guard(
            Pipeline::new()
                .filter(Filter::new().gte("ratingsAverage", 4.5))
                .sort("price", Direction::Asc),
        )
        .compile(&TOUR_SOURCE)
        .unwrap();

        assert!(compiled
            .sql
            .contains("s0.\"secretTour\" IS DISTINCT FROM $1"));
        assert!(compiled.sql.contains("s1.\"ratingsAverage\" >= $2"));
        assert_eq!(
            compiled.binds,
            vec![FilterValue::Bool(true), FilterValue::Float(4.5)]
        );
    }

    #[test]
    fn test_read_statements_start_filtered() {
        let mut qb = visible_tours("SELECT *");
        qb.push(" AND id = ").push_bind(Uuid::nil());
        assert_eq!(qb.sql(), "SELECT * FROM tours WHERE NOT secret_tour AND id = $1");
    }
}
