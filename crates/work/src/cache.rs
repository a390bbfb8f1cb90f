//! Per-owner in-memory view of the store.

use std::collections::HashMap;
use skillmatrix_core::{
    GamificationProfile, Goal, GoalId, Notification, NotificationId, Rating, RatingId, Time, UserId,
};
use skillmatrix_storage::ChangeSet;

/// What the service knows about one owner.
///
/// Only ever updated from confirmed store state: a full refresh, a targeted
/// re-fetch, or a change set that was applied successfully.
#[derive(Debug, Clone)]
pub struct OwnerCache {
    /// Owner of every cached record
    pub owner_id: UserId,

    /// Ratings by id
    pub ratings: HashMap<RatingId, Rating>,

    /// Goals by id
    pub goals: HashMap<GoalId, Goal>,

    /// Notifications by id
    pub notifications: HashMap<NotificationId, Notification>,

    /// Gamification profile, if one exists yet
    pub profile: Option<GamificationProfile>,

    /// When the last full refresh happened
    pub loaded_at: Time,
}

impl OwnerCache {
    /// Build a cache from freshly fetched records.
    pub fn from_records(
        owner_id: UserId,
        ratings: Vec<Rating>,
        goals: Vec<Goal>,
        notifications: Vec<Notification>,
        profile: Option<GamificationProfile>,
        loaded_at: Time,
    ) -> Self {
        Self {
            owner_id,
            ratings: ratings.into_iter().map(|r| (r.id, r)).collect(),
            goals: goals.into_iter().map(|g| (g.id, g)).collect(),
            notifications: notifications.into_iter().map(|n| (n.id, n)).collect(),
            profile,
            loaded_at,
        }
    }

    /// Merge the records of a committed change set that belong to this owner.
    pub fn merge(&mut self, changes: &ChangeSet) {
        for rating in changes.ratings.iter().filter(|r| r.owner_id == self.owner_id) {
            self.ratings.insert(rating.id, rating.clone());
        }
        for goal in changes.goals.iter().filter(|g| g.owner_id == self.owner_id) {
            self.goals.insert(goal.id, goal.clone());
        }
        for note in changes.notifications.iter().filter(|n| n.owner_id == self.owner_id) {
            self.notifications.insert(note.id, note.clone());
        }
        if let Some(profile) = changes.profiles.iter().find(|p| p.owner_id == self.owner_id) {
            self.profile = Some(profile.clone());
        }
    }

    /// Goals ordered by creation.
    pub fn goals_sorted(&self) -> Vec<Goal> {
        let mut goals: Vec<Goal> = self.goals.values().cloned().collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        goals
    }

    /// Ratings ordered by creation.
    pub fn ratings_sorted(&self) -> Vec<Rating> {
        let mut ratings: Vec<Rating> = self.ratings.values().cloned().collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        ratings
    }

    /// Unread notification count.
    pub fn unread_count(&self) -> usize {
        self.notifications.values().filter(|n| !n.read).count()
    }
}
