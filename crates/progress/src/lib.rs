//! Progress Tracking
//!
//! Goal progress, milestones and category rollups. Everything here is pure
//! computation over records that were already fetched.

#![warn(missing_docs)]

pub mod calculator;
pub mod aggregator;

pub use calculator::{
    milestone_for, GoalProgressCalculator, ProgressOutcome, ProgressUpdate, EIGHTY_PERCENT,
    FIFTY_PERCENT,
};
pub use aggregator::{aggregate, current_rating_for_unit, CategoryProgressSummary, RatingCounts};
