//! Data models for Natours

pub mod booking;
pub mod filter;
pub mod geo;
pub mod review;
pub mod tour;
pub mod user;

// Re-export commonly used types
pub use booking::Booking;
pub use review::Review;
pub use tour::{Tour, TourDocument};
pub use user::{GuideSummary, User};
