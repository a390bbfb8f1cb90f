//! Skill workflow service.
//!
//! Owns the storage handle and the per-owner caches. Every mutating
//! operation runs under the storage lock as read, compute, apply: the
//! transition and all of its side effects go to the store as one change set,
//! and caches are only touched after the store confirmed the write.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use skillmatrix_core::{
    CategoryId, ChangeEvent, Collection, GamificationDelta, GamificationProfile, Goal, GoalId,
    GoalProgressHistory, GoalStatus, Notification, NotificationId, Rating, RatingId, RatingLevel,
    RatingStatus, SkillId, SubskillId, Time, UserId, XP_PER_LEVEL,
};
use skillmatrix_progress::{
    aggregate, current_rating_for_unit, CategoryProgressSummary, GoalProgressCalculator,
};
use skillmatrix_storage::{ChangeSet, Storage};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::OwnerCache;
use crate::effects::{side_effects, SideEffects, TransitionEvent};
use crate::error::{Result, ServiceError};

/// Configuration for the skill service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// XP granted for setting a goal
    pub xp_goal_created: u32,
    /// XP granted for completing a goal
    pub xp_goal_completed: u32,
    /// XP needed per level
    pub xp_per_level: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            xp_goal_created: 10,
            xp_goal_completed: 50,
            xp_per_level: XP_PER_LEVEL,
        }
    }
}

/// Specification for creating a goal.
#[derive(Debug, Clone)]
pub struct GoalSpec {
    /// Skill to improve
    pub skill_id: SkillId,
    /// Subskill to improve, for skills rated per subskill
    pub subskill_id: Option<SubskillId>,
    /// Rating to reach
    pub target_rating: RatingLevel,
    /// Starting rating; defaults to the current approved rating, else low
    pub current_rating: Option<RatingLevel>,
    /// Deadline
    pub target_date: NaiveDate,
}

/// The operations the UI drives.
#[async_trait]
pub trait RatingWorkflow: Send + Sync {
    /// Submit a draft rating for approval.
    async fn submit_rating(&self, rating_id: RatingId, actor: &UserId, comment: &str) -> Result<Rating>;

    /// Approve a submitted rating and move the owner's matching goals.
    async fn approve_rating(&self, rating_id: RatingId, approver: &UserId, comment: &str) -> Result<ChangeSet>;

    /// Reject a submitted rating.
    async fn reject_rating(&self, rating_id: RatingId, approver: &UserId, comment: &str) -> Result<ChangeSet>;

    /// Create a personal goal.
    async fn create_goal(&self, owner: &UserId, spec: GoalSpec, today: NaiveDate) -> Result<ChangeSet>;

    /// Re-derive progress and overdue status of an owner's goals.
    async fn refresh_goal_progress(&self, owner: &UserId, today: NaiveDate) -> Result<ChangeSet>;

    /// Roll up an owner's ratings for one category.
    async fn aggregate_category(&self, owner: &UserId, category_id: &CategoryId) -> Result<CategoryProgressSummary>;
}

/// Records and effects collected while computing one operation.
#[derive(Default)]
struct PendingChanges {
    changes: ChangeSet,
    deltas: BTreeMap<UserId, GamificationDelta>,
}

impl PendingChanges {
    fn absorb(&mut self, effects: SideEffects) {
        if let Some(notification) = effects.notification {
            self.changes.notifications.push(notification);
        }
        if let Some((owner, delta)) = effects.gamification {
            let entry = self.deltas.entry(owner).or_default();
            *entry = entry.merge(delta);
        }
    }
}

/// Service over a storage backend.
pub struct SkillService<S: Storage> {
    storage: Arc<Mutex<S>>,
    caches: RwLock<HashMap<UserId, OwnerCache>>,
    calculator: GoalProgressCalculator,
    config: ServiceConfig,
}

impl<S: Storage + 'static> SkillService<S> {
    /// Create a service owning the storage.
    pub fn new(storage: S) -> Self {
        Self::from_shared(Arc::new(Mutex::new(storage)))
    }

    /// Create a service over a storage handle shared with other components.
    pub fn from_shared(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            caches: RwLock::new(HashMap::new()),
            calculator: GoalProgressCalculator,
            config: ServiceConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared storage handle.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    // === Cache management ===

    /// Cached view of an owner, fetching it on first use.
    pub async fn load(&self, owner: &UserId) -> Result<OwnerCache> {
        if let Some(cache) = self.caches.read().await.get(owner) {
            return Ok(cache.clone());
        }
        self.refresh(owner).await
    }

    /// Re-fetch everything the cache holds for an owner.
    ///
    /// The storage lock is held until the snapshot is in the cache, so no
    /// commit can land between the read and the insert.
    pub async fn refresh(&self, owner: &UserId) -> Result<OwnerCache> {
        let storage = self.storage.lock().await;
        let cache = OwnerCache::from_records(
            owner.clone(),
            storage.list_ratings(owner).await?,
            storage.list_goals(owner).await?,
            storage.list_notifications(owner).await?,
            storage.load_profile(owner).await?,
            Utc::now(),
        );
        self.caches.write().await.insert(owner.clone(), cache.clone());
        drop(storage);

        debug!(
            "Refreshed cache for {}: {} ratings, {} goals",
            owner,
            cache.ratings.len(),
            cache.goals.len()
        );
        Ok(cache)
    }

    /// Drop the cached view of an owner.
    pub async fn invalidate(&self, owner: &UserId) {
        self.caches.write().await.remove(owner);
    }

    /// Goals of an owner if cached, without touching the store.
    pub async fn cached_goals(&self, owner: &UserId) -> Option<Vec<Goal>> {
        self.caches.read().await.get(owner).map(|c| c.goals_sorted())
    }

    async fn merge_cache(&self, changes: &ChangeSet) {
        let mut caches = self.caches.write().await;
        for cache in caches.values_mut() {
            cache.merge(changes);
        }
    }

    /// Subscribe to the store's change feed.
    pub async fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.storage.lock().await.subscribe()
    }

    /// Apply one change event: re-fetch only the affected record and merge it.
    ///
    /// Events for owners that are not cached are ignored.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Result<()> {
        if !self.caches.read().await.contains_key(&event.owner_id) {
            return Ok(());
        }
        let parse_err = |_| {
            ServiceError::Validation(format!(
                "malformed {:?} id '{}' in change event",
                event.collection, event.entity_id
            ))
        };

        match event.collection {
            Collection::Ratings => {
                let id: RatingId = event.entity_id.parse().map_err(parse_err)?;
                let rating = self.storage.lock().await.load_rating(id).await?;
                let mut caches = self.caches.write().await;
                if let Some(cache) = caches.get_mut(&event.owner_id) {
                    match rating {
                        Some(r) => cache.ratings.insert(id, r),
                        None => cache.ratings.remove(&id),
                    };
                }
            }
            Collection::Goals => {
                let id: GoalId = event.entity_id.parse().map_err(parse_err)?;
                let goal = self.storage.lock().await.load_goal(id).await?;
                let mut caches = self.caches.write().await;
                if let Some(cache) = caches.get_mut(&event.owner_id) {
                    match goal {
                        Some(g) => cache.goals.insert(id, g),
                        None => cache.goals.remove(&id),
                    };
                }
            }
            Collection::Notifications => {
                let id: NotificationId = event.entity_id.parse().map_err(parse_err)?;
                let note = self.storage.lock().await.load_notification(id).await?;
                let mut caches = self.caches.write().await;
                if let Some(cache) = caches.get_mut(&event.owner_id) {
                    match note {
                        Some(n) => cache.notifications.insert(id, n),
                        None => cache.notifications.remove(&id),
                    };
                }
            }
            Collection::Profiles => {
                let profile = self.storage.lock().await.load_profile(&event.owner_id).await?;
                if let Some(cache) = self.caches.write().await.get_mut(&event.owner_id) {
                    cache.profile = profile;
                }
            }
            // History is not cached.
            Collection::GoalHistory => {}
        }
        debug!("Merged {:?} change {}", event.collection, event.entity_id);
        Ok(())
    }

    /// Drive `handle_change` from a change feed until it closes.
    ///
    /// When the receiver lags behind, every cached owner is refreshed in full.
    pub async fn run_change_listener(self: Arc<Self>, mut rx: broadcast::Receiver<ChangeEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle_change(&event).await {
                        warn!("Failed to merge change {:?}: {}", event, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} change events, refreshing cached owners", missed);
                    let owners: Vec<UserId> = self.caches.read().await.keys().cloned().collect();
                    for owner in owners {
                        if let Err(e) = self.refresh(&owner).await {
                            warn!("Failed to refresh {}: {}", owner, e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Change listener stopped");
    }

    // === Commit ===

    /// Add profile updates and write the whole set.
    async fn commit(&self, storage: &mut S, pending: PendingChanges, now: Time) -> Result<ChangeSet> {
        let PendingChanges { mut changes, deltas } = pending;
        for (owner, delta) in deltas {
            if delta.is_empty() {
                continue;
            }
            // Increment the stored profile, never a cached copy.
            let mut profile = storage
                .load_profile(&owner)
                .await?
                .unwrap_or_else(|| GamificationProfile::new(owner.clone(), now));
            profile.apply(delta, self.config.xp_per_level, now);
            changes.profiles.push(profile);
        }

        if changes.is_empty() {
            return Ok(changes);
        }
        storage.apply(&changes).await?;
        self.merge_cache(&changes).await;
        debug!("Committed {}", changes.summary());
        Ok(changes)
    }

    // === Ratings ===

    /// Start a new draft rating for a skill or subskill.
    pub async fn create_rating(
        &self,
        owner: &UserId,
        skill_id: SkillId,
        subskill_id: Option<SubskillId>,
        level: RatingLevel,
    ) -> Result<Rating> {
        if skill_id.as_str().trim().is_empty() {
            return Err(ServiceError::Validation("a skill must be selected".to_string()));
        }
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let catalog = storage.load_catalog().await?;
        if !catalog.has_unit(&skill_id, subskill_id.as_ref()) {
            return Err(ServiceError::NotFound(unit_name(&skill_id, subskill_id.as_ref())));
        }
        let in_flight = storage.list_ratings(owner).await?.into_iter().any(|r| {
            r.is_for_unit(&skill_id, subskill_id.as_ref())
                && matches!(r.status, RatingStatus::Draft | RatingStatus::Submitted)
        });
        if in_flight {
            return Err(ServiceError::Validation(format!(
                "{} already has an open rating",
                unit_name(&skill_id, subskill_id.as_ref())
            )));
        }

        let rating = Rating::draft(owner.clone(), skill_id, subskill_id, level, now);
        let pending = PendingChanges {
            changes: ChangeSet::new().with_rating(rating.clone()),
            ..Default::default()
        };
        self.commit(&mut *storage, pending, now).await?;
        info!("Created draft rating {} for {}", rating.id, owner);
        Ok(rating)
    }

    async fn review(
        &self,
        rating_id: RatingId,
        approver: &UserId,
        comment: &str,
        approve: bool,
    ) -> Result<ChangeSet> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let mut rating = storage
            .load_rating(rating_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("rating {}", rating_id)))?;
        if &rating.owner_id == approver {
            return Err(ServiceError::Forbidden("ratings cannot be reviewed by their owner".to_string()));
        }

        if approve {
            rating.approve(approver.clone(), comment, now)?;
        } else {
            rating.reject(approver.clone(), comment, now)?;
        }

        let mut pending = PendingChanges::default();
        let event = if approve {
            TransitionEvent::RatingApproved(&rating)
        } else {
            TransitionEvent::RatingRejected(&rating)
        };
        pending.absorb(side_effects(event, &self.config, now));

        if approve {
            let goals = storage.list_goals(&rating.owner_id).await?;
            for goal in goals.iter().filter(|g| {
                g.status.is_open() && g.is_for_unit(&rating.skill_id, rating.subskill_id.as_ref())
            }) {
                let update = self.calculator.update_progress(goal, rating.level, now)?;
                pending.absorb(side_effects(
                    TransitionEvent::GoalProgressed {
                        goal: &update.goal,
                        outcome: update.outcome,
                    },
                    &self.config,
                    now,
                ));
                pending.changes.history.push(update.history);
                pending.changes.goals.push(update.goal);
            }
        }
        pending.changes.ratings.push(rating);

        let changes = self.commit(&mut *storage, pending, now).await?;
        info!(
            "Rating {} {} by {} ({} goals updated)",
            rating_id,
            if approve { "approved" } else { "rejected" },
            approver,
            changes.goals.len()
        );
        Ok(changes)
    }

    /// Submitted ratings awaiting a decision, excluding the approver's own.
    pub async fn pending_approvals(&self, approver: &UserId) -> Result<Vec<Rating>> {
        let storage = self.storage.lock().await;
        Ok(storage
            .list_ratings_by_status(RatingStatus::Submitted)
            .await?
            .into_iter()
            .filter(|r| &r.owner_id != approver)
            .collect())
    }

    // === Goals ===

    /// Cancel an open goal.
    pub async fn cancel_goal(&self, goal_id: GoalId, actor: &UserId) -> Result<Goal> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let mut goal = storage
            .load_goal(goal_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("goal {}", goal_id)))?;
        if &goal.owner_id != actor {
            return Err(ServiceError::Forbidden("only the owner can cancel a goal".to_string()));
        }
        if !goal.status.is_open() {
            return Err(ServiceError::Validation(format!("goal {} is already {}", goal_id, goal.status)));
        }

        goal.status = GoalStatus::Cancelled;
        goal.updated_at = now;
        let pending = PendingChanges {
            changes: ChangeSet::new().with_goal(goal.clone()),
            ..Default::default()
        };
        self.commit(&mut *storage, pending, now).await?;
        info!("Cancelled goal {}", goal_id);
        Ok(goal)
    }

    /// Progress history of a goal, oldest first.
    pub async fn goal_history(&self, goal_id: GoalId) -> Result<Vec<GoalProgressHistory>> {
        let storage = self.storage.lock().await;
        if storage.load_goal(goal_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("goal {}", goal_id)));
        }
        Ok(storage.list_goal_history(goal_id).await?)
    }

    // === Notifications and gamification ===

    /// Notifications of an owner, newest first.
    pub async fn notifications(&self, owner: &UserId, unread_only: bool) -> Result<Vec<Notification>> {
        let cache = self.load(owner).await?;
        let mut notes: Vec<Notification> = cache
            .notifications
            .into_values()
            .filter(|n| !unread_only || !n.read)
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes)
    }

    /// Flag a notification as read.
    pub async fn mark_notification_read(&self, id: NotificationId, actor: &UserId) -> Result<Notification> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let mut note = storage
            .load_notification(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("notification {}", id)))?;
        if &note.owner_id != actor {
            return Err(ServiceError::Forbidden("notification belongs to another user".to_string()));
        }
        if note.read {
            return Ok(note);
        }

        note.read = true;
        let pending = PendingChanges {
            changes: ChangeSet::new().with_notification(note.clone()),
            ..Default::default()
        };
        self.commit(&mut *storage, pending, now).await?;
        Ok(note)
    }

    /// Gamification profile of an owner, created on first access.
    pub async fn gamification_profile(&self, owner: &UserId) -> Result<GamificationProfile> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;
        if let Some(profile) = storage.load_profile(owner).await? {
            return Ok(profile);
        }

        let profile = GamificationProfile::new(owner.clone(), now);
        let pending = PendingChanges {
            changes: ChangeSet::new().with_profile(profile.clone()),
            ..Default::default()
        };
        self.commit(&mut *storage, pending, now).await?;
        info!("Created gamification profile for {}", owner);
        Ok(profile)
    }
}

fn unit_name(skill_id: &SkillId, subskill_id: Option<&SubskillId>) -> String {
    match subskill_id {
        Some(sub) => format!("skill {} / subskill {}", skill_id, sub),
        None => format!("skill {}", skill_id),
    }
}

/// Level of the newest approved rating for a unit, if any.
fn approved_level(ratings: &[Rating], skill_id: &SkillId, subskill_id: Option<&SubskillId>) -> Option<RatingLevel> {
    current_rating_for_unit(ratings.iter().filter(|r| r.is_for_unit(skill_id, subskill_id)))
        .filter(|r| r.status == RatingStatus::Approved)
        .map(|r| r.level)
}

#[async_trait]
impl<S: Storage + 'static> RatingWorkflow for SkillService<S> {
    async fn submit_rating(&self, rating_id: RatingId, actor: &UserId, comment: &str) -> Result<Rating> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let mut rating = storage
            .load_rating(rating_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("rating {}", rating_id)))?;
        if &rating.owner_id != actor {
            return Err(ServiceError::Forbidden("only the owner can submit a rating".to_string()));
        }
        rating.submit(comment, now)?;

        let mut pending = PendingChanges::default();
        pending.absorb(side_effects(TransitionEvent::RatingSubmitted(&rating), &self.config, now));
        pending.changes.ratings.push(rating.clone());
        self.commit(&mut *storage, pending, now).await?;

        info!("Rating {} submitted by {}", rating_id, actor);
        Ok(rating)
    }

    async fn approve_rating(&self, rating_id: RatingId, approver: &UserId, comment: &str) -> Result<ChangeSet> {
        self.review(rating_id, approver, comment, true).await
    }

    async fn reject_rating(&self, rating_id: RatingId, approver: &UserId, comment: &str) -> Result<ChangeSet> {
        self.review(rating_id, approver, comment, false).await
    }

    async fn create_goal(&self, owner: &UserId, spec: GoalSpec, today: NaiveDate) -> Result<ChangeSet> {
        if spec.skill_id.as_str().trim().is_empty() {
            return Err(ServiceError::Validation("a skill must be selected".to_string()));
        }
        if spec.target_date < today {
            return Err(ServiceError::Validation(format!(
                "target date {} is in the past",
                spec.target_date
            )));
        }
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let catalog = storage.load_catalog().await?;
        if !catalog.has_unit(&spec.skill_id, spec.subskill_id.as_ref()) {
            return Err(ServiceError::NotFound(unit_name(&spec.skill_id, spec.subskill_id.as_ref())));
        }

        let current = match spec.current_rating {
            Some(level) => level,
            None => {
                let ratings = storage.list_ratings(owner).await?;
                approved_level(&ratings, &spec.skill_id, spec.subskill_id.as_ref())
                    .unwrap_or(RatingLevel::Low)
            }
        };
        if spec.target_rating <= current {
            return Err(ServiceError::Validation(format!(
                "target rating {} must be above the current rating {}",
                spec.target_rating, current
            )));
        }

        let goal = Goal::new(
            owner.clone(),
            spec.skill_id,
            spec.subskill_id,
            spec.target_rating,
            current,
            spec.target_date,
            now,
        );
        let mut pending = PendingChanges::default();
        pending.absorb(side_effects(TransitionEvent::GoalCreated(&goal), &self.config, now));
        pending.changes.goals.push(goal.clone());

        let changes = self.commit(&mut *storage, pending, now).await?;
        info!("Created goal {} for {} ({} -> {})", goal.id, owner, current, goal.target_rating);
        Ok(changes)
    }

    async fn refresh_goal_progress(&self, owner: &UserId, today: NaiveDate) -> Result<ChangeSet> {
        let now = Utc::now();
        let mut storage = self.storage.lock().await;

        let goals = storage.list_goals(owner).await?;
        let ratings = storage.list_ratings(owner).await?;
        let mut pending = PendingChanges::default();

        for mut goal in goals.into_iter().filter(|g| g.status.is_open()) {
            let mut changed = false;

            let approved = approved_level(&ratings, &goal.skill_id, goal.subskill_id.as_ref());
            if let Some(level) = approved.filter(|l| *l != goal.current_rating) {
                let update = self.calculator.update_progress(&goal, level, now)?;
                pending.absorb(side_effects(
                    TransitionEvent::GoalProgressed {
                        goal: &update.goal,
                        outcome: update.outcome,
                    },
                    &self.config,
                    now,
                ));
                pending.changes.history.push(update.history);
                goal = update.goal;
                changed = true;
            }

            if self.calculator.check_overdue(&mut goal, today, now) {
                pending.absorb(side_effects(TransitionEvent::GoalOverdue(&goal), &self.config, now));
                changed = true;
            }

            if changed {
                pending.changes.goals.push(goal);
            }
        }

        let changes = self.commit(&mut *storage, pending, now).await?;
        if !changes.goals.is_empty() {
            info!("Refreshed {} goals for {}", changes.goals.len(), owner);
        }
        Ok(changes)
    }

    async fn aggregate_category(&self, owner: &UserId, category_id: &CategoryId) -> Result<CategoryProgressSummary> {
        let catalog = self.storage.lock().await.load_catalog().await?;
        if catalog.category(category_id).is_none() {
            return Err(ServiceError::NotFound(format!("category {}", category_id)));
        }

        let cache = self.load(owner).await?;
        let ratings = cache.ratings_sorted();
        Ok(aggregate(&catalog.skills_in(category_id), &catalog.subskills, &ratings))
    }
}
