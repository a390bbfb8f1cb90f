//! Goal model - a personal target rating for one skill with progress tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::id::{GoalId, HistoryId, SkillId, SubskillId, UserId};
use crate::rating::RatingLevel;
use crate::Time;

/// A goal to reach a target rating on a skill (or subskill) by a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Employee who set the goal
    pub owner_id: UserId,

    /// Skill the goal is about
    pub skill_id: SkillId,

    /// Subskill the goal is about, if any
    pub subskill_id: Option<SubskillId>,

    /// Rating the owner wants to reach
    pub target_rating: RatingLevel,

    /// Latest approved rating
    pub current_rating: RatingLevel,

    /// Deadline
    pub target_date: NaiveDate,

    /// Goal status
    pub status: GoalStatus,

    /// Percentage complete (0-100)
    pub progress_percentage: u8,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,

    /// When the target was reached
    pub completed_at: Option<Time>,
}

/// Goal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Goal is being worked on
    Active,
    /// Target rating reached
    Completed,
    /// Target date passed while active
    Overdue,
    /// Abandoned by the owner
    Cancelled,
}

impl GoalStatus {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Overdue => "overdue",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    /// Whether new ratings still move this goal.
    pub fn is_open(self) -> bool {
        matches!(self, GoalStatus::Active | GoalStatus::Overdue)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `min(100, round(100 * rank(current) / rank(target)))`.
pub fn progress_percentage(current: RatingLevel, target: RatingLevel) -> u8 {
    let ratio = 100.0 * current.rank() as f64 / target.rank() as f64;
    ratio.round().min(100.0) as u8
}

impl Goal {
    /// Create an active goal.
    pub fn new(
        owner_id: UserId,
        skill_id: SkillId,
        subskill_id: Option<SubskillId>,
        target_rating: RatingLevel,
        current_rating: RatingLevel,
        target_date: NaiveDate,
        now: Time,
    ) -> Self {
        Self {
            id: GoalId::new(),
            owner_id,
            skill_id,
            subskill_id,
            target_rating,
            current_rating,
            target_date,
            status: GoalStatus::Active,
            progress_percentage: progress_percentage(current_rating, target_rating),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether this goal tracks the given skill/subskill unit.
    pub fn is_for_unit(&self, skill_id: &SkillId, subskill_id: Option<&SubskillId>) -> bool {
        &self.skill_id == skill_id && self.subskill_id.as_ref() == subskill_id
    }

    /// Check progress, status and completion time agree.
    pub fn validate(&self) -> Result<()> {
        let expected = progress_percentage(self.current_rating, self.target_rating);
        if self.progress_percentage != expected {
            return Err(CoreError::validation(format!(
                "goal {} records {}% but {} of {} is {}%",
                self.id, self.progress_percentage, self.current_rating, self.target_rating, expected
            )));
        }
        if (self.progress_percentage >= 100) != (self.status == GoalStatus::Completed) {
            return Err(CoreError::validation(format!(
                "goal {} is {} at {}%",
                self.id, self.status, self.progress_percentage
            )));
        }
        if (self.status == GoalStatus::Completed) != self.completed_at.is_some() {
            return Err(CoreError::validation(format!(
                "goal {} is {} but completed_at is {}",
                self.id,
                self.status,
                if self.completed_at.is_some() { "set" } else { "missing" }
            )));
        }
        Ok(())
    }
}

/// A named progress threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    /// Target reached
    #[serde(rename = "completed")]
    Completed,
    /// Crossed 80%
    #[serde(rename = "80_percent")]
    EightyPercent,
    /// Crossed 50%
    #[serde(rename = "50_percent")]
    FiftyPercent,
}

impl Milestone {
    /// Stored label.
    pub fn as_str(self) -> &'static str {
        match self {
            Milestone::Completed => "completed",
            Milestone::EightyPercent => "80_percent",
            Milestone::FiftyPercent => "50_percent",
        }
    }
}

/// Immutable record of one progress update on a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgressHistory {
    /// Unique identifier
    pub id: HistoryId,

    /// Goal that changed
    pub goal_id: GoalId,

    /// Goal owner
    pub owner_id: UserId,

    /// Rating before the update
    pub previous_rating: RatingLevel,

    /// Rating after the update
    pub new_rating: RatingLevel,

    /// Percentage after the update
    pub progress_percentage: u8,

    /// Threshold crossed by this update
    pub milestone: Option<Milestone>,

    /// When recorded
    pub recorded_at: Time,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_progress_percentage_table() {
        use RatingLevel::*;
        assert_eq!(progress_percentage(Low, High), 33);
        assert_eq!(progress_percentage(Medium, High), 67);
        assert_eq!(progress_percentage(High, High), 100);
        assert_eq!(progress_percentage(Low, Medium), 50);
        assert_eq!(progress_percentage(High, Low), 100);
    }

    #[test]
    fn test_progress_monotonic_in_current_rank() {
        for target in RatingLevel::ALL {
            let values: Vec<u8> = RatingLevel::ALL
                .iter()
                .map(|c| progress_percentage(*c, target))
                .collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
        }
    }

    #[test]
    fn test_goal_serde_round_trip() {
        let goal = Goal::new(
            UserId::new("emp-1"),
            SkillId::new("sql"),
            Some(SubskillId::new("window-functions")),
            RatingLevel::High,
            RatingLevel::Low,
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            Utc::now(),
        );
        let json = serde_json::to_string(&goal).unwrap();
        assert!(json.contains("\"target_date\":\"2025-06-30\""));
        let back: Goal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, goal);
        assert_eq!(back.progress_percentage, 33);
    }

    fn active_goal(target: RatingLevel, current: RatingLevel) -> Goal {
        Goal::new(
            UserId::new("emp-1"),
            SkillId::new("sql"),
            None,
            target,
            current,
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_validate_accepts_consistent_goals() {
        active_goal(RatingLevel::High, RatingLevel::Low).validate().unwrap();

        let mut done = active_goal(RatingLevel::Medium, RatingLevel::Medium);
        done.status = GoalStatus::Completed;
        done.completed_at = Some(Utc::now());
        done.validate().unwrap();

        let mut cancelled = active_goal(RatingLevel::High, RatingLevel::Medium);
        cancelled.status = GoalStatus::Cancelled;
        cancelled.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_broken_goals() {
        // already at target but still active
        assert!(active_goal(RatingLevel::Low, RatingLevel::High).validate().is_err());

        let mut stale = active_goal(RatingLevel::High, RatingLevel::Low);
        stale.progress_percentage = 67;
        assert!(stale.validate().is_err());

        let mut early = active_goal(RatingLevel::High, RatingLevel::Medium);
        early.status = GoalStatus::Completed;
        early.completed_at = Some(Utc::now());
        assert!(early.validate().is_err());

        let mut undated = active_goal(RatingLevel::Medium, RatingLevel::Medium);
        undated.status = GoalStatus::Completed;
        assert!(undated.validate().is_err());

        let mut dated = active_goal(RatingLevel::High, RatingLevel::Low);
        dated.completed_at = Some(Utc::now());
        assert!(dated.validate().is_err());
    }

    #[test]
    fn test_milestone_labels() {
        assert_eq!(serde_json::to_string(&Milestone::EightyPercent).unwrap(), "\"80_percent\"");
        let m: Milestone = serde_json::from_str("\"50_percent\"").unwrap();
        assert_eq!(m, Milestone::FiftyPercent);
        assert_eq!(Milestone::Completed.as_str(), "completed");
    }
}
