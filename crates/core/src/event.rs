//! Change events - what the store announces after a commit.

use serde::{Deserialize, Serialize};
use crate::id::UserId;

/// Record collection a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Skill and subskill ratings
    Ratings,
    /// Personal goals
    Goals,
    /// Goal progress history
    GoalHistory,
    /// Gamification profiles
    Profiles,
    /// Notifications
    Notifications,
}

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Record created
    Insert,
    /// Record modified
    Update,
}

/// A single committed change, delivered asynchronously to subscribers.
///
/// No ordering is guaranteed across different entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Affected collection
    pub collection: Collection,

    /// Id of the changed record (the owner id for profiles)
    pub entity_id: String,

    /// Owner of the changed record
    pub owner_id: UserId,

    /// Insert or update
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Create a change event.
    pub fn new(
        collection: Collection,
        entity_id: impl ToString,
        owner_id: UserId,
        kind: ChangeKind,
    ) -> Self {
        Self {
            collection,
            entity_id: entity_id.to_string(),
            owner_id,
            kind,
        }
    }
}
