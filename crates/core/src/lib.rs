//! SkillMatrix core data models.
//!
//! This crate defines the records of the skill-rating workflow and the
//! rating state machine that governs them.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Ratings and goals
mod rating;
mod goal;
mod catalog;

// Side-effect records
mod gamification;
mod notification;
mod event;

// Re-exports
pub use id::*;
pub use error::{CoreError, Result};

pub use rating::{Rating, RatingLevel, RatingStatus, Review};
pub use goal::{Goal, GoalStatus, GoalProgressHistory, Milestone, progress_percentage};
pub use catalog::{Category, Skill, Subskill, SkillCatalog};

pub use gamification::{GamificationProfile, GamificationDelta, XP_PER_LEVEL};
pub use notification::{Notification, NotificationType};
pub use event::{ChangeEvent, ChangeKind, Collection};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
