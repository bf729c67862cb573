//! Tour model and related types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::{types::Json, Decode, Encode, FromRow, Postgres};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{
    filter::{CompareOp, Direction, Filter, FilterValue},
    geo::{GeoPoint, Location},
    review::Review,
    user::GuideSummary,
};
use crate::error::{AppError, AppResult};

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Ratings to store on a tour given its review count and mean rating.
///
/// A tour without reviews goes back to `(0, 4.5)`.
pub fn ratings_from_reviews(quantity: i64, average: Option<f64>) -> AppResult<(i32, f64)> {
    match average {
        Some(avg) if quantity > 0 => {
            let quantity = i32::try_from(quantity)
                .map_err(|_| AppError::Internal("Ratings quantity overflow".to_string()))?;
            Ok((quantity, round_rating(avg)))
        }
        _ => Ok((0, DEFAULT_RATINGS_AVERAGE)),
    }
}

/// Tour difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            _ => Err("Difficulty can be either: easy, medium, or difficult".to_string()),
        }
    }
}

// Stored as TEXT, constrained by a CHECK in the schema
impl sqlx::Type<Postgres> for Difficulty {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Difficulty {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Difficulty {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Lowercase, hyphen separated, URL safe form of a tour name.
///
/// Accents are stripped, every run of whitespace or punctuation becomes a
/// single `-` and no leading or trailing `-` is kept.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Ratings are kept with a single decimal
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Tour row as stored in the database, guides as bare identifiers
#[derive(Debug, Clone, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: Decimal,
    pub price_discount: Option<Decimal>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Json<GeoPoint>>,
    pub locations: Json<Vec<Location>>,
    pub guides: Vec<Uuid>,
}

impl TourRow {
    /// Replace guide identifiers by the matching summaries, keeping the stored order.
    /// Identifiers without a matching user are dropped.
    pub fn into_tour(self, guides: &HashMap<Uuid, GuideSummary>) -> Tour {
        let guides = self
            .guides
            .iter()
            .filter_map(|id| guides.get(id).cloned())
            .collect();

        Tour {
            id: self.id,
            name: self.name,
            slug: self.slug,
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: self.ratings_average,
            ratings_quantity: self.ratings_quantity,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary,
            description: self.description,
            image_cover: self.image_cover,
            images: self.images,
            created_at: self.created_at,
            start_dates: self.start_dates,
            secret_tour: self.secret_tour,
            start_location: self.start_location.map(|j| j.0),
            locations: self.locations.0,
            guides,
        }
    }
}

/// Tour as returned by reads, guides resolved to user summaries
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// Duration in days
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price_discount: Option<Decimal>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<Location>,
    pub guides: Vec<GuideSummary>,
}

impl Tour {
    /// Duration expressed in weeks, never stored
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }
}

/// Tour with its computed fields, the shape sent to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TourDocument {
    #[serde(flatten)]
    pub tour: Tour,
    pub duration_weeks: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

impl From<Tour> for TourDocument {
    fn from(tour: Tour) -> Self {
        Self {
            duration_weeks: tour.duration_weeks(),
            tour,
            reviews: None,
        }
    }
}

impl TourDocument {
    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = Some(reviews);
        self
    }
}

/// Name + distance of a tour relative to a point
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    /// Distance in the requested unit
    pub distance: f64,
}

fn validate_pricing(tour: &CreateTour) -> Result<(), ValidationError> {
    if tour.price <= Decimal::ZERO {
        let mut err = ValidationError::new("price");
        err.message = Some("A tour must have a positive price".into());
        return Err(err);
    }
    if let Some(discount) = tour.price_discount {
        if discount >= tour.price {
            let mut err = ValidationError::new("price_discount");
            err.message = Some(
                format!(
                    "Discount price ({}) should be below the regular price",
                    discount
                )
                .into(),
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Create tour request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_pricing"))]
pub struct CreateTour {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters"
    ))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_discount: Option<Decimal>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

impl CreateTour {
    /// Apply field setters: trim strings, round the rating
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.description = self.description.map(|d| d.trim().to_string());
        self.ratings_average = self.ratings_average.map(round_rating);
        self
    }

    /// Full creation check: setters, field validators, cross-field pricing, coordinates
    pub fn checked(self) -> AppResult<Self> {
        let tour = self.normalized();
        tour.validate()?;
        validate_points(tour.start_location.as_ref(), &tour.locations)?;
        Ok(tour)
    }
}

fn validate_points(start: Option<&GeoPoint>, locations: &[Location]) -> AppResult<()> {
    if let Some(start) = start {
        start.validate_coordinates()?;
    }
    for location in locations {
        location.point.validate_coordinates()?;
    }
    Ok(())
}

/// Partial tour update. Field validators run on supplied fields only;
/// the discount/price cross check does not.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTour {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters"
    ))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0"))]
    pub ratings_average: Option<f64>,
    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_discount: Option<Decimal>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<Location>>,
    pub guides: Option<Vec<Uuid>>,
}

impl UpdateTour {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.summary = self.summary.map(|s| s.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self.ratings_average = self.ratings_average.map(round_rating);
        self
    }

    pub fn checked(self) -> AppResult<Self> {
        let update = self.normalized();
        update.validate()?;
        if let Some(price) = update.price {
            if price <= Decimal::ZERO {
                return Err(AppError::Validation(
                    "A tour must have a positive price".to_string(),
                ));
            }
        }
        validate_points(
            update.start_location.as_ref(),
            update.locations.as_deref().unwrap_or_default(),
        )?;
        Ok(update)
    }
}

/// Query fields that may be used in listing filters: (json name, column, numeric)
const FILTERABLE_FIELDS: &[(&str, &str, bool)] = &[
    ("duration", "duration", true),
    ("ratingsQuantity", "ratings_quantity", true),
    ("ratingsAverage", "ratings_average", true),
    ("maxGroupSize", "max_group_size", true),
    ("difficulty", "difficulty", false),
    ("price", "price", true),
];

/// Fields that may be used for sorting, on top of the filterable ones
const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("createdAt", "created_at"),
    ("priceDiscount", "price_discount"),
];

/// Fields that may be selected with `fields=`
const PROJECTABLE_FIELDS: &[&str] = &[
    "id",
    "name",
    "slug",
    "duration",
    "durationWeeks",
    "maxGroupSize",
    "difficulty",
    "ratingsAverage",
    "ratingsQuantity",
    "price",
    "priceDiscount",
    "summary",
    "description",
    "imageCover",
    "images",
    "startDates",
    "secretTour",
    "startLocation",
    "locations",
    "guides",
];

const RESERVED_PARAMS: &[&str] = &["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Listing options parsed from the query string: filtering, sorting, field limiting, pagination
#[derive(Debug, Clone, PartialEq)]
pub struct TourQuery {
    /// Conditions on database columns
    pub filter: Filter,
    /// (column, direction)
    pub sort: Vec<(String, Direction)>,
    /// Selected JSON fields, `None` for all
    pub fields: Option<Vec<String>>,
    pub page: i64,
    pub limit: i64,
}

impl Default for TourQuery {
    fn default() -> Self {
        Self {
            filter: Filter::new(),
            sort: vec![("created_at".to_string(), Direction::Desc)],
            fields: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TourQuery {
    /// Parse `?difficulty=easy&price[lt]=1500&sort=-price&fields=name,price&page=2&limit=10`
    pub fn from_params(params: &HashMap<String, String>) -> AppResult<Self> {
        let mut query = TourQuery::default();

        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();

        for key in keys {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let raw = &params[key];
            let (field, op) = match key.split_once('[') {
                Some((field, rest)) => {
                    let op = rest
                        .strip_suffix(']')
                        .and_then(CompareOp::from_param)
                        .ok_or_else(|| {
                            AppError::Validation(format!("Invalid filter operator in {}", key))
                        })?;
                    (field, op)
                }
                None => (key.as_str(), CompareOp::Eq),
            };

            let (_, column, numeric) = FILTERABLE_FIELDS
                .iter()
                .find(|(name, _, _)| *name == field)
                .ok_or_else(|| AppError::Validation(format!("Cannot filter on {}", field)))?;

            let value = if *numeric {
                let n: f64 = raw.parse().map_err(|_| {
                    AppError::Validation(format!("Invalid number for {}: {}", field, raw))
                })?;
                FilterValue::Float(n)
            } else {
                FilterValue::Text(raw.clone())
            };
            query.filter = query.filter.with(column, op, value);
        }

        if let Some(sort) = params.get("sort") {
            query.sort = parse_sort(sort)?;
        }

        if let Some(fields) = params.get("fields") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            if let Some(unknown) = fields
                .iter()
                .find(|f| !PROJECTABLE_FIELDS.contains(&f.as_str()))
            {
                return Err(AppError::Validation(format!("Unknown field {}", unknown)));
            }
            query.fields = Some(fields);
        }

        if let Some(page) = params.get("page") {
            query.page = parse_positive(page, "page")?;
        }
        if let Some(limit) = params.get("limit") {
            query.limit = parse_positive(limit, "limit")?;
            if query.limit > MAX_PAGE_SIZE {
                return Err(AppError::Validation(format!(
                    "limit must not exceed {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        query.offset()?;

        Ok(query)
    }

    /// The five best rated, cheapest tours
    pub fn top_cheap() -> Self {
        Self {
            sort: vec![
                ("ratings_average".to_string(), Direction::Desc),
                ("price".to_string(), Direction::Asc),
            ],
            fields: Some(
                ["name", "price", "ratingsAverage", "summary", "difficulty"]
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            ),
            limit: 5,
            ..Self::default()
        }
    }

    /// Rows to skip before the requested page
    pub fn offset(&self) -> AppResult<i64> {
        self.page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(self.limit))
            .ok_or_else(|| AppError::Validation(format!("page {} is out of range", self.page)))
    }

    /// Keep only the selected fields (and `id`) of a serialized tour
    pub fn project(&self, doc: serde_json::Value) -> serde_json::Value {
        match (&self.fields, doc) {
            (Some(fields), serde_json::Value::Object(map)) => serde_json::Value::Object(
                map.into_iter()
                    .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                    .collect(),
            ),
            (_, doc) => doc,
        }
    }
}

fn parse_sort(sort: &str) -> AppResult<Vec<(String, Direction)>> {
    sort.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let (name, direction) = match s.strip_prefix('-') {
                Some(name) => (name, Direction::Desc),
                None => (s, Direction::Asc),
            };
            FILTERABLE_FIELDS
                .iter()
                .map(|(n, c, _)| (*n, *c))
                .chain(SORTABLE_FIELDS.iter().copied())
                .find(|(n, _)| *n == name)
                .map(|(_, column)| (column.to_string(), direction))
                .ok_or_else(|| AppError::Validation(format!("Cannot sort on {}", name)))
        })
        .collect()
}

fn parse_positive(raw: &str, name: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Validation(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}
