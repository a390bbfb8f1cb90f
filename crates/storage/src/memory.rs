//! In-memory storage backend.
//!
//! Everything lives in maps behind the caller's lock, so `apply` is
//! all-or-nothing. Used by tests and by embedders that sync elsewhere.

use std::collections::HashMap;
use skillmatrix_core::{
    ChangeEvent, ChangeKind, Collection, GamificationProfile, Goal, GoalId, GoalProgressHistory,
    Notification, NotificationId, Rating, RatingId, RatingStatus, SkillCatalog, UserId,
};
use tokio::sync::broadcast;
use tracing::debug;
use super::{ChangeSet, Result, Storage, StorageError};

const EVENT_CAPACITY: usize = 256;

/// Map-backed storage.
pub struct MemoryStorage {
    ratings: HashMap<RatingId, Rating>,
    goals: HashMap<GoalId, Goal>,
    history: Vec<GoalProgressHistory>,
    profiles: HashMap<UserId, GamificationProfile>,
    notifications: HashMap<NotificationId, Notification>,
    catalog: SkillCatalog,
    events: broadcast::Sender<ChangeEvent>,
    reject_writes: bool,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            ratings: HashMap::new(),
            goals: HashMap::new(),
            history: Vec::new(),
            profiles: HashMap::new(),
            notifications: HashMap::new(),
            catalog: SkillCatalog::default(),
            events,
            reject_writes: false,
        }
    }

    /// Seed the catalog.
    pub fn with_catalog(mut self, catalog: SkillCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Make every subsequent `apply` fail, to simulate an unreachable store.
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn kind(exists: bool) -> ChangeKind {
    if exists {
        ChangeKind::Update
    } else {
        ChangeKind::Insert
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn load_rating(&self, id: RatingId) -> Result<Option<Rating>> {
        Ok(self.ratings.get(&id).cloned())
    }

    async fn list_ratings(&self, owner: &UserId) -> Result<Vec<Rating>> {
        let mut ratings: Vec<Rating> = self
            .ratings
            .values()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ratings)
    }

    async fn list_ratings_by_status(&self, status: RatingStatus) -> Result<Vec<Rating>> {
        let mut ratings: Vec<Rating> = self
            .ratings
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ratings)
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        Ok(self.goals.get(&id).cloned())
    }

    async fn list_goals(&self, owner: &UserId) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .goals
            .values()
            .filter(|g| &g.owner_id == owner)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }

    async fn list_goal_history(&self, goal_id: GoalId) -> Result<Vec<GoalProgressHistory>> {
        Ok(self
            .history
            .iter()
            .filter(|h| h.goal_id == goal_id)
            .cloned()
            .collect())
    }

    async fn load_profile(&self, owner: &UserId) -> Result<Option<GamificationProfile>> {
        Ok(self.profiles.get(owner).cloned())
    }

    async fn load_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self.notifications.get(&id).cloned())
    }

    async fn list_notifications(&self, owner: &UserId) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .values()
            .filter(|n| &n.owner_id == owner)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn load_catalog(&self) -> Result<SkillCatalog> {
        Ok(self.catalog.clone())
    }

    async fn save_catalog(&mut self, catalog: &SkillCatalog) -> Result<()> {
        self.catalog = catalog.clone();
        Ok(())
    }

    async fn apply(&mut self, changes: &ChangeSet) -> Result<()> {
        if self.reject_writes {
            return Err(StorageError::Other("store is not accepting writes".to_string()));
        }
        changes.validate()?;
        for entry in &changes.history {
            if self.history.iter().any(|h| h.id == entry.id) {
                return Err(StorageError::Conflict(format!(
                    "history entry {} already exists",
                    entry.id
                )));
            }
        }

        let mut events = Vec::new();
        for rating in &changes.ratings {
            let existed = self.ratings.insert(rating.id, rating.clone()).is_some();
            events.push(ChangeEvent::new(Collection::Ratings, rating.id, rating.owner_id.clone(), kind(existed)));
        }
        for goal in &changes.goals {
            let existed = self.goals.insert(goal.id, goal.clone()).is_some();
            events.push(ChangeEvent::new(Collection::Goals, goal.id, goal.owner_id.clone(), kind(existed)));
        }
        for entry in &changes.history {
            self.history.push(entry.clone());
            events.push(ChangeEvent::new(Collection::GoalHistory, entry.id, entry.owner_id.clone(), ChangeKind::Insert));
        }
        for profile in &changes.profiles {
            let existed = self
                .profiles
                .insert(profile.owner_id.clone(), profile.clone())
                .is_some();
            events.push(ChangeEvent::new(Collection::Profiles, &profile.owner_id, profile.owner_id.clone(), kind(existed)));
        }
        for notification in &changes.notifications {
            let existed = self
                .notifications
                .insert(notification.id, notification.clone())
                .is_some();
            events.push(ChangeEvent::new(
                Collection::Notifications,
                notification.id,
                notification.owner_id.clone(),
                kind(existed),
            ));
        }

        debug!("Applied change set: {}", changes.summary());
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
