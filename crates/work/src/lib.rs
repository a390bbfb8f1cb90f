//! Skill workflow service
//!
//! Rating approval, goal tracking, notifications and gamification on top of
//! a storage backend, with per-owner caches kept in sync with the store.

#![warn(missing_docs)]

pub mod cache;
pub mod effects;
pub mod error;
pub mod service;

pub use cache::OwnerCache;
pub use effects::{side_effects, SideEffects, TransitionEvent};
pub use error::{Result, ServiceError};
pub use service::{GoalSpec, RatingWorkflow, ServiceConfig, SkillService};
