//! Tours service

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        filter::{CompareOp, Direction, Filter},
        geo::{DistanceUnit, LatLng},
        tour::{CreateTour, Tour, TourDistance, TourDocument, TourQuery, UpdateTour},
    },
    repository::{
        pipeline::{Accumulator, Group, GroupKey, Pipeline},
        Repository,
    },
};

fn start_of_year(year: i32) -> AppResult<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid year {}", year)))
}

/// Statistics per difficulty over well rated tours
pub fn tour_stats_pipeline() -> Pipeline {
    Pipeline::new()
        .filter(Filter::new().gte("ratingsAverage", 4.5))
        .group(
            Group::by(GroupKey::Upper("difficulty".into()))
                .field("numTours", Accumulator::Count)
                .field("numRatings", Accumulator::Sum("ratingsQuantity".into()))
                .field("avgRating", Accumulator::Avg("ratingsAverage".into()))
                .field("avgPrice", Accumulator::Avg("price".into()))
                .field("minPrice", Accumulator::Min("price".into()))
                .field("maxPrice", Accumulator::Max("price".into())),
        )
        .sort("avgPrice", Direction::Asc)
}

/// Tour starts per month of `year`, busiest month first.
///
/// Starts with an unwind, so the secrecy guard does not apply to it.
pub fn monthly_plan_pipeline(year: i32) -> AppResult<Pipeline> {
    Ok(Pipeline::new()
        .unwind("startDates")
        .filter(
            Filter::new()
                .gte("startDates", start_of_year(year)?)
                .with("startDates", CompareOp::Lt, start_of_year(year + 1)?),
        )
        .group(
            Group::by(GroupKey::Month("startDates".into()))
                .field("numTourStarts", Accumulator::Count)
                .field("tours", Accumulator::Push("name".into())),
        )
        .add_field("month", "_id")
        .project(&["month", "numTourStarts", "tours"])
        .sort("numTourStarts", Direction::Desc)
        .limit(12))
}

/// Search radius must be a finite number greater than zero
fn check_distance(distance: f64) -> AppResult<()> {
    if !distance.is_finite() || distance <= 0.0 {
        return Err(AppError::BadRequest("Distance must be a positive number".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ToursService {
    repository: Repository,
}

impl ToursService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List one page of visible tours
    pub async fn list(&self, query: &TourQuery) -> AppResult<Vec<Tour>> {
        self.repository.tours.list(query).await
    }

    /// Get a tour together with its reviews
    pub async fn get_with_reviews(&self, id: Uuid) -> AppResult<TourDocument> {
        let tour = self.repository.tours.get_by_id(id).await?;
        let reviews = self.repository.reviews.list(Some(id)).await?;
        Ok(TourDocument::from(tour).with_reviews(reviews))
    }

    pub async fn create(&self, data: CreateTour) -> AppResult<Tour> {
        let data = data.checked()?;
        let tour = self.repository.tours.create(&data).await?;
        tracing::info!(tour_id = %tour.id, name = %tour.name, "Tour created");
        Ok(tour)
    }

    /// Create a tour under a fixed ID (seed data)
    pub async fn import(&self, id: Uuid, data: CreateTour) -> AppResult<Tour> {
        let data = data.checked()?;
        self.repository.tours.insert(id, &data).await
    }

    pub async fn update(&self, id: Uuid, data: UpdateTour) -> AppResult<Tour> {
        let data = data.checked()?;
        self.repository.tours.update(id, &data).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.tours.delete(id).await?;
        tracing::info!(tour_id = %id, "Tour deleted");
        Ok(())
    }

    pub async fn stats(&self) -> AppResult<Vec<serde_json::Value>> {
        self.repository.tours.aggregate(tour_stats_pipeline()).await
    }

    pub async fn monthly_plan(&self, year: i32) -> AppResult<Vec<serde_json::Value>> {
        self.repository
            .tours
            .aggregate(monthly_plan_pipeline(year)?)
            .await
    }

    pub async fn within(&self, distance: f64, center: LatLng, unit: DistanceUnit) -> AppResult<Vec<Tour>> {
        check_distance(distance)?;
        self.repository.tours.within(center, distance, unit).await
    }

    pub async fn distances(&self, center: LatLng, unit: DistanceUnit) -> AppResult<Vec<TourDistance>> {
        self.repository.tours.distances(center, unit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        pipeline::Stage,
        tours::{with_secrecy_guard, TOUR_SOURCE},
    };

    #[test]
    fn test_stats_pipeline_is_guarded() {
        let guarded = with_secrecy_guard(tour_stats_pipeline());
        assert_eq!(guarded.stages().len(), 4);
        assert!(guarded.compile(&TOUR_SOURCE).is_ok());
    }

    #[test]
    fn test_monthly_plan_is_not_guarded() {
        let pipeline = monthly_plan_pipeline(2021).unwrap();
        assert!(matches!(pipeline.first(), Some(Stage::Unwind(_))));

        let guarded = with_secrecy_guard(pipeline.clone());
        assert_eq!(guarded, pipeline);

        let compiled = guarded.compile(&TOUR_SOURCE).unwrap();
        assert!(!compiled.sql.contains("secretTour\" IS DISTINCT FROM"));
        assert_eq!(compiled.binds.len(), 2);
    }

    #[test]
    fn test_check_distance() {
        assert!(check_distance(250.0).is_ok());
        assert!(check_distance(0.5).is_ok());
        assert!(check_distance(0.0).is_err());
        assert!(check_distance(-1.0).is_err());
        assert!(check_distance(f64::NAN).is_err());
        assert!(check_distance(f64::INFINITY).is_err());
    }

    #[test]
    fn test_start_of_year() {
        assert_eq!(start_of_year(2021).unwrap().to_rfc3339(), "2021-01-01T00:00:00+00:00");
        assert!(start_of_year(i32::MAX).is_err());
    }
}
