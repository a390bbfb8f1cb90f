//! Storage trait abstraction.

use async_trait::async_trait;
use skillmatrix_core::{
    ChangeEvent, CoreError, GamificationProfile, Goal, GoalId, GoalProgressHistory, Notification,
    NotificationId, Rating, RatingId, RatingStatus, SkillCatalog, UserId,
};
use tokio::sync::broadcast;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write conflicts with what is already stored
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Record violates a model invariant
    #[error("Invalid record: {0}")]
    Invalid(#[from] CoreError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Records written together as one logical operation.
///
/// A state transition and the notifications and profile updates it causes
/// travel in the same set, so a reader never sees one without the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Ratings to insert or update
    pub ratings: Vec<Rating>,

    /// Goals to insert or update
    pub goals: Vec<Goal>,

    /// History entries to insert (never updated)
    pub history: Vec<GoalProgressHistory>,

    /// Profiles to insert or update
    pub profiles: Vec<GamificationProfile>,

    /// Notifications to insert or update
    pub notifications: Vec<Notification>,
}

impl ChangeSet {
    /// Empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
            && self.goals.is_empty()
            && self.history.is_empty()
            && self.profiles.is_empty()
            && self.notifications.is_empty()
    }

    /// Add a rating.
    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.ratings.push(rating);
        self
    }

    /// Add a goal.
    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    /// Add a notification.
    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    /// Add a profile.
    pub fn with_profile(mut self, profile: GamificationProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Append another set.
    pub fn extend(&mut self, other: ChangeSet) {
        self.ratings.extend(other.ratings);
        self.goals.extend(other.goals);
        self.history.extend(other.history);
        self.profiles.extend(other.profiles);
        self.notifications.extend(other.notifications);
    }

    /// Short summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} ratings, {} goals, {} history, {} profiles, {} notifications",
            self.ratings.len(),
            self.goals.len(),
            self.history.len(),
            self.profiles.len(),
            self.notifications.len()
        )
    }

    /// Reject records that break model invariants before anything is written.
    pub fn validate(&self) -> Result<()> {
        for rating in &self.ratings {
            rating.validate()?;
        }
        for goal in &self.goals {
            goal.validate()?;
        }
        Ok(())
    }
}

/// Storage abstraction for SkillMatrix records.
///
/// This is the seam to the hosted record store. Reads are scoped by owner or
/// id; all writes go through [`Storage::apply`].
#[async_trait]
pub trait Storage: Send + Sync {
    // === Rating operations ===

    /// Load a rating by ID.
    async fn load_rating(&self, id: RatingId) -> Result<Option<Rating>>;

    /// List all ratings of an owner.
    async fn list_ratings(&self, owner: &UserId) -> Result<Vec<Rating>>;

    /// List ratings of every owner in the given status.
    async fn list_ratings_by_status(&self, status: RatingStatus) -> Result<Vec<Rating>>;

    // === Goal operations ===

    /// Load a goal by ID.
    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>>;

    /// List all goals of an owner.
    async fn list_goals(&self, owner: &UserId) -> Result<Vec<Goal>>;

    /// List the progress history of a goal, oldest first.
    async fn list_goal_history(&self, goal_id: GoalId) -> Result<Vec<GoalProgressHistory>>;

    // === Gamification and notifications ===

    /// Load the gamification profile of an owner.
    async fn load_profile(&self, owner: &UserId) -> Result<Option<GamificationProfile>>;

    /// Load a notification by ID.
    async fn load_notification(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// List notifications of an owner, newest first.
    async fn list_notifications(&self, owner: &UserId) -> Result<Vec<Notification>>;

    // === Catalog ===

    /// Load the skill catalog.
    async fn load_catalog(&self) -> Result<SkillCatalog>;

    /// Replace the skill catalog.
    async fn save_catalog(&mut self, catalog: &SkillCatalog) -> Result<()>;

    // === Writes and change feed ===

    /// Insert or update every record of the set as one logical operation.
    ///
    /// On error none of the records may be treated as committed.
    async fn apply(&mut self, changes: &ChangeSet) -> Result<()>;

    /// Subscribe to committed changes.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
