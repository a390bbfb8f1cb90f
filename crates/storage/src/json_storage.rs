//! JSON file storage implementation.
//!
//! Stores one JSON file per record under a root directory and keeps small
//! per-object meta markers (version + updated_at). Profiles live in a single
//! `profiles.json` map keyed by owner, the catalog in `catalog.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use skillmatrix_core::{
    ChangeEvent, ChangeKind, Collection, GamificationProfile, Goal, GoalId, GoalProgressHistory,
    Notification, NotificationId, Rating, RatingId, RatingStatus, Result as CoreResult,
    SkillCatalog, UserId,
};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use super::{ChangeSet, Result, Storage, StorageError};

const EVENT_CAPACITY: usize = 256;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    events: broadcast::Sender<ChangeEvent>,
}

/// A file write prepared before anything touches the disk.
struct Staged {
    path: PathBuf,
    body: String,
    previous: Option<String>,
    meta: Option<(&'static str, String)>,
}

impl JsonStorage {
    /// Create storage, creating the data and meta directories as needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in ["ratings", "goals", "goal_history", "notifications"] {
            fs::create_dir_all(root.join(kind)).await?;
            fs::create_dir_all(root.join("meta").join(kind)).await?;
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { root, events })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn rating_path(&self, id: RatingId) -> PathBuf {
        self.root.join("ratings").join(format!("{}.json", id))
    }
    fn goal_path(&self, id: GoalId) -> PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }
    fn history_path(&self, id: &str) -> PathBuf {
        self.root.join("goal_history").join(format!("{}.json", id))
    }
    fn notification_path(&self, id: NotificationId) -> PathBuf {
        self.root.join("notifications").join(format!("{}.json", id))
    }
    fn profiles_path(&self) -> PathBuf {
        self.root.join("profiles.json")
    }
    fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn load_profiles(&self) -> Result<BTreeMap<UserId, GamificationProfile>> {
        Ok(read_json(&self.profiles_path()).await?.unwrap_or_default())
    }

    async fn stage_record<T: serde::Serialize>(
        &self,
        staged: &mut Vec<Staged>,
        events: &mut Vec<ChangeEvent>,
        path: PathBuf,
        record: &T,
        meta_kind: &'static str,
        event: (Collection, String, UserId),
    ) -> Result<()> {
        let previous = read_raw(&path).await?;
        let (collection, id, owner) = event;
        let kind = if previous.is_some() { ChangeKind::Update } else { ChangeKind::Insert };
        events.push(ChangeEvent::new(collection, &id, owner, kind));
        staged.push(Staged {
            path,
            body: serde_json::to_string_pretty(record)?,
            previous,
            meta: Some((meta_kind, id)),
        });
        Ok(())
    }

    /// Restore files written before a failure.
    async fn undo(&self, written: &[Staged]) {
        for staged in written.iter().rev() {
            let restored = match &staged.previous {
                Some(body) => write_atomic(&staged.path, body).await,
                None => fs::remove_file(&staged.path).await.map_err(Into::into),
            };
            if let Err(e) = restored {
                warn!("Failed to restore {}: {}", staged.path.display(), e);
            }
        }
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn load_rating(&self, id: RatingId) -> Result<Option<Rating>> {
        let rating: Option<Rating> = read_json(&self.rating_path(id)).await?;
        if let Some(r) = &rating {
            r.validate()?;
        }
        Ok(rating)
    }

    async fn list_ratings(&self, owner: &UserId) -> Result<Vec<Rating>> {
        let all = list_dir(&self.root.join("ratings"), Rating::validate).await?;
        let mut ratings: Vec<Rating> = all
            .into_iter()
            .filter(|r: &Rating| &r.owner_id == owner)
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ratings)
    }

    async fn list_ratings_by_status(&self, status: RatingStatus) -> Result<Vec<Rating>> {
        let all = list_dir(&self.root.join("ratings"), Rating::validate).await?;
        let mut ratings: Vec<Rating> = all
            .into_iter()
            .filter(|r: &Rating| r.status == status)
            .collect();
        ratings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(ratings)
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        let goal: Option<Goal> = read_json(&self.goal_path(id)).await?;
        if let Some(g) = &goal {
            g.validate()?;
        }
        Ok(goal)
    }

    async fn list_goals(&self, owner: &UserId) -> Result<Vec<Goal>> {
        let all = list_dir(&self.root.join("goals"), Goal::validate).await?;
        let mut goals: Vec<Goal> = all
            .into_iter()
            .filter(|g: &Goal| &g.owner_id == owner)
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }

    async fn list_goal_history(&self, goal_id: GoalId) -> Result<Vec<GoalProgressHistory>> {
        let all = list_dir(&self.root.join("goal_history"), unchecked).await?;
        let mut entries: Vec<GoalProgressHistory> = all
            .into_iter()
            .filter(|h: &GoalProgressHistory| h.goal_id == goal_id)
            .collect();
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn load_profile(&self, owner: &UserId) -> Result<Option<GamificationProfile>> {
        Ok(self.load_profiles().await?.remove(owner))
    }

    async fn load_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        read_json(&self.notification_path(id)).await
    }

    async fn list_notifications(&self, owner: &UserId) -> Result<Vec<Notification>> {
        let all = list_dir(&self.root.join("notifications"), unchecked).await?;
        let mut notifications: Vec<Notification> = all
            .into_iter()
            .filter(|n: &Notification| &n.owner_id == owner)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn load_catalog(&self) -> Result<SkillCatalog> {
        Ok(read_json(&self.catalog_path()).await?.unwrap_or_default())
    }

    async fn save_catalog(&mut self, catalog: &SkillCatalog) -> Result<()> {
        let json = serde_json::to_string_pretty(catalog)?;
        write_atomic(&self.catalog_path(), &json).await?;
        debug!(
            "Saved catalog: {} categories, {} skills, {} subskills",
            catalog.categories.len(),
            catalog.skills.len(),
            catalog.subskills.len()
        );
        Ok(())
    }

    async fn apply(&mut self, changes: &ChangeSet) -> Result<()> {
        changes.validate()?;

        // Serialize everything first so a bad record never leaves a partial write.
        let mut staged = Vec::new();
        let mut events = Vec::new();

        for rating in &changes.ratings {
            let event = (Collection::Ratings, rating.id.to_string(), rating.owner_id.clone());
            self.stage_record(&mut staged, &mut events, self.rating_path(rating.id), rating, "ratings", event)
                .await?;
        }
        for goal in &changes.goals {
            let event = (Collection::Goals, goal.id.to_string(), goal.owner_id.clone());
            self.stage_record(&mut staged, &mut events, self.goal_path(goal.id), goal, "goals", event)
                .await?;
        }
        for entry in &changes.history {
            let id = entry.id.to_string();
            let path = self.history_path(&id);
            if fs::try_exists(&path).await? {
                return Err(StorageError::Conflict(format!("history entry {} already exists", id)));
            }
            let event = (Collection::GoalHistory, id, entry.owner_id.clone());
            self.stage_record(&mut staged, &mut events, path, entry, "goal_history", event)
                .await?;
        }
        for notification in &changes.notifications {
            let event = (Collection::Notifications, notification.id.to_string(), notification.owner_id.clone());
            self.stage_record(
                &mut staged,
                &mut events,
                self.notification_path(notification.id),
                notification,
                "notifications",
                event,
            )
            .await?;
        }
        if !changes.profiles.is_empty() {
            let path = self.profiles_path();
            let previous = read_raw(&path).await?;
            let mut profiles = self.load_profiles().await?;
            for profile in &changes.profiles {
                let existed = profiles
                    .insert(profile.owner_id.clone(), profile.clone())
                    .is_some();
                let kind = if existed { ChangeKind::Update } else { ChangeKind::Insert };
                events.push(ChangeEvent::new(Collection::Profiles, &profile.owner_id, profile.owner_id.clone(), kind));
            }
            staged.push(Staged {
                path,
                body: serde_json::to_string_pretty(&profiles)?,
                previous,
                meta: None,
            });
        }

        for (i, file) in staged.iter().enumerate() {
            if let Err(e) = write_atomic(&file.path, &file.body).await {
                warn!("Write of {} failed, restoring {} files", file.path.display(), i);
                self.undo(&staged[..i]).await;
                return Err(e);
            }
        }

        for file in &staged {
            if let Some((kind, id)) = &file.meta {
                if let Err(e) = self.bump_version(kind, id).await {
                    warn!("Failed to bump version for {}/{}: {}", kind, id, e);
                }
            }
        }

        debug!("Applied change set: {}", changes.summary());
        for event in events {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

async fn write_atomic(path: &Path, body: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_raw(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_raw(path).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn unchecked<T>(_: &T) -> CoreResult<()> {
    Ok(())
}

/// Read every record in a directory, skipping unreadable or invalid ones.
async fn list_dir<T: serde::de::DeserializeOwned>(
    dir: &Path,
    check: fn(&T) -> CoreResult<()>,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json::<T>(&entry.path()).await {
            Ok(Some(item)) => match check(&item) {
                Ok(()) => items.push(item),
                Err(e) => warn!("Skipping invalid record {}: {}", entry.path().display(), e),
            },
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable record {}: {}", entry.path().display(), e),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use skillmatrix_core::{
        Category, CategoryId, GoalStatus, HistoryId, Milestone, NotificationType, RatingLevel,
        Skill, SkillId,
    };

    async fn storage() -> (tempfile::TempDir, JsonStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    fn goal(owner: &str) -> Goal {
        Goal::new(
            UserId::new(owner),
            SkillId::new("rust"),
            None,
            RatingLevel::High,
            RatingLevel::Low,
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let (dir, mut storage) = storage().await;
        let mut rating = Rating::draft(UserId::new("emp-1"), SkillId::new("rust"), None, RatingLevel::Medium, Utc::now());
        rating.submit("reviewed PRs", Utc::now()).unwrap();
        let goal = goal("emp-1");
        let profile = GamificationProfile::new(UserId::new("emp-1"), Utc::now());

        storage
            .apply(&ChangeSet::new().with_rating(rating.clone()).with_goal(goal.clone()).with_profile(profile.clone()))
            .await
            .unwrap();

        let reopened = JsonStorage::new(dir.path()).await.unwrap();
        assert_eq!(reopened.load_rating(rating.id).await.unwrap(), Some(rating.clone()));
        assert_eq!(reopened.list_goals(&UserId::new("emp-1")).await.unwrap(), vec![goal]);
        assert_eq!(reopened.load_profile(&UserId::new("emp-1")).await.unwrap(), Some(profile));
        assert_eq!(
            reopened.list_ratings_by_status(RatingStatus::Submitted).await.unwrap(),
            vec![rating]
        );
        assert!(reopened.load_profile(&UserId::new("emp-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_is_insert_only() {
        let (_dir, mut storage) = storage().await;
        let goal = goal("emp-1");
        let entry = GoalProgressHistory {
            id: HistoryId::new(),
            goal_id: goal.id,
            owner_id: goal.owner_id.clone(),
            previous_rating: RatingLevel::Low,
            new_rating: RatingLevel::Medium,
            progress_percentage: 67,
            milestone: Some(Milestone::FiftyPercent),
            recorded_at: Utc::now(),
        };
        let mut changes = ChangeSet::new().with_goal(goal.clone());
        changes.history.push(entry.clone());
        storage.apply(&changes).await.unwrap();

        let mut again = ChangeSet::new();
        again.history.push(entry.clone());
        assert!(matches!(storage.apply(&again).await, Err(StorageError::Conflict(_))));
        assert_eq!(storage.list_goal_history(goal.id).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_invalid_change_set_leaves_disk_untouched() {
        let (_dir, mut storage) = storage().await;
        let mut broken_goal = goal("emp-1");
        broken_goal.status = GoalStatus::Completed;
        broken_goal.progress_percentage = 150;
        let note = Notification::new(UserId::new("emp-1"), NotificationType::Success, "t", "m", Utc::now());

        let result = storage
            .apply(&ChangeSet::new().with_notification(note.clone()).with_goal(broken_goal))
            .await;
        assert!(result.is_err());
        assert!(storage.load_notification(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tampered_rating_is_rejected_on_load() {
        let (_dir, mut storage) = storage().await;
        let rating = Rating::draft(UserId::new("emp-1"), SkillId::new("rust"), None, RatingLevel::High, Utc::now());
        let other = Rating::draft(UserId::new("emp-1"), SkillId::new("sql"), None, RatingLevel::Low, Utc::now());
        storage
            .apply(&ChangeSet::new().with_rating(rating.clone()).with_rating(other.clone()))
            .await
            .unwrap();

        // approved without a review
        let path = storage.rating_path(rating.id);
        let body = fs::read_to_string(&path).await.unwrap();
        fs::write(&path, body.replace("\"draft\"", "\"approved\"")).await.unwrap();

        assert!(matches!(storage.load_rating(rating.id).await, Err(StorageError::Invalid(_))));
        assert_eq!(storage.list_ratings(&UserId::new("emp-1")).await.unwrap(), vec![other.clone()]);
        assert!(storage.list_ratings_by_status(RatingStatus::Approved).await.unwrap().is_empty());
        assert_eq!(storage.load_rating(other.id).await.unwrap(), Some(other));
    }

    #[tokio::test]
    async fn test_tampered_goal_is_rejected_on_load() {
        let (_dir, mut storage) = storage().await;
        let goal = goal("emp-1");
        storage.apply(&ChangeSet::new().with_goal(goal.clone())).await.unwrap();

        let path = storage.goal_path(goal.id);
        let body = fs::read_to_string(&path).await.unwrap();
        fs::write(&path, body.replace("\"active\"", "\"completed\"")).await.unwrap();

        assert!(matches!(storage.load_goal(goal.id).await, Err(StorageError::Invalid(_))));
        assert!(storage.list_goals(&UserId::new("emp-1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_restores_earlier_files() {
        let (_dir, mut storage) = storage().await;
        let original = goal("emp-1");
        storage.apply(&ChangeSet::new().with_goal(original.clone())).await.unwrap();
        let mut rx = storage.subscribe();

        let rating = Rating::draft(UserId::new("emp-1"), SkillId::new("rust"), None, RatingLevel::Low, Utc::now());
        let mut cancelled = original.clone();
        cancelled.status = GoalStatus::Cancelled;
        cancelled.updated_at = Utc::now();
        let note = Notification::new(UserId::new("emp-1"), NotificationType::Info, "t", "m", Utc::now());

        // notifications are written after ratings and goals; block the temp file
        let blocker = storage.notification_path(note.id).with_extension("json.tmp");
        fs::create_dir_all(&blocker).await.unwrap();

        let result = storage
            .apply(
                &ChangeSet::new()
                    .with_rating(rating.clone())
                    .with_goal(cancelled)
                    .with_notification(note.clone()),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Io(_))));

        assert!(storage.load_rating(rating.id).await.unwrap().is_none());
        assert!(!fs::try_exists(storage.rating_path(rating.id)).await.unwrap());
        assert_eq!(storage.load_goal(original.id).await.unwrap(), Some(original.clone()));
        assert!(storage.load_notification(note.id).await.unwrap().is_none());
        assert!(!fs::try_exists(storage.meta_path("ratings", &rating.id.to_string())).await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_catalog_and_events() {
        let (_dir, mut storage) = storage().await;
        assert_eq!(storage.load_catalog().await.unwrap(), SkillCatalog::default());

        let catalog = SkillCatalog {
            categories: vec![Category { id: CategoryId::new("lang"), name: "Languages".into() }],
            skills: vec![Skill { id: SkillId::new("rust"), category_id: CategoryId::new("lang"), name: "Rust".into() }],
            subskills: vec![],
        };
        storage.save_catalog(&catalog).await.unwrap();
        assert_eq!(storage.load_catalog().await.unwrap(), catalog);

        let mut rx = storage.subscribe();
        let note = Notification::new(UserId::new("emp-1"), NotificationType::Info, "t", "m", Utc::now());
        storage.apply(&ChangeSet::new().with_notification(note.clone())).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Notifications);
        assert_eq!(event.entity_id, note.id.to_string());
        assert_eq!(event.owner_id, UserId::new("emp-1"));
    }
}
