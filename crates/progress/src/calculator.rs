//! Goal progress calculation.

use chrono::NaiveDate;
use skillmatrix_core::{
    progress_percentage, CoreError, Goal, GoalProgressHistory, GoalStatus, HistoryId, Milestone,
    RatingLevel, Result, Time,
};
use tracing::debug;

/// Percentage at which the "almost there" notification fires.
pub const EIGHTY_PERCENT: u8 = 80;

/// Percentage recorded as the half-way milestone.
pub const FIFTY_PERCENT: u8 = 50;

/// What a progress update means for notifications and gamification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Target reached, goal completed
    Completed,
    /// Crossed 80% without completing
    EightyPercent,
    /// Nothing worth announcing
    Unchanged,
}

/// Result of applying a new rating to a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Goal after the update
    pub goal: Goal,

    /// History entry describing the update
    pub history: GoalProgressHistory,

    /// Announcement to make
    pub outcome: ProgressOutcome,
}

/// Milestone crossed when progress moves from `previous` to `new`.
///
/// Checked in priority order: completed, then 80%, then 50%.
pub fn milestone_for(previous: u8, new: u8) -> Option<Milestone> {
    if new >= 100 {
        Some(Milestone::Completed)
    } else if previous < EIGHTY_PERCENT && new >= EIGHTY_PERCENT {
        Some(Milestone::EightyPercent)
    } else if previous < FIFTY_PERCENT && new >= FIFTY_PERCENT {
        Some(Milestone::FiftyPercent)
    } else {
        None
    }
}

/// Derives goal progress and status from ratings and dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalProgressCalculator;

impl GoalProgressCalculator {
    /// Apply a newly approved rating to a goal.
    ///
    /// Only active and overdue goals move; completed and cancelled goals are
    /// rejected with a validation error.
    pub fn update_progress(
        &self,
        goal: &Goal,
        new_rating: RatingLevel,
        now: Time,
    ) -> Result<ProgressUpdate> {
        if !goal.status.is_open() {
            return Err(CoreError::validation(format!(
                "goal {} is {} and no longer tracks progress",
                goal.id, goal.status
            )));
        }

        let previous = goal.progress_percentage;
        let progress = progress_percentage(new_rating, goal.target_rating);
        let milestone = milestone_for(previous, progress);

        let mut updated = goal.clone();
        updated.current_rating = new_rating;
        updated.progress_percentage = progress;
        updated.updated_at = now;

        let outcome = if progress >= 100 {
            updated.status = GoalStatus::Completed;
            updated.completed_at = Some(now);
            ProgressOutcome::Completed
        } else if previous < EIGHTY_PERCENT && progress >= EIGHTY_PERCENT {
            ProgressOutcome::EightyPercent
        } else {
            ProgressOutcome::Unchanged
        };

        debug!(
            "Goal {} progress {}% -> {}% ({:?})",
            goal.id, previous, progress, outcome
        );

        let history = GoalProgressHistory {
            id: HistoryId::new(),
            goal_id: goal.id,
            owner_id: goal.owner_id.clone(),
            previous_rating: goal.current_rating,
            new_rating,
            progress_percentage: progress,
            milestone,
            recorded_at: now,
        };

        Ok(ProgressUpdate {
            goal: updated,
            history,
            outcome,
        })
    }

    /// Mark an active goal overdue once its target date has passed.
    ///
    /// Returns whether the goal changed. Calling it again is a no-op.
    pub fn check_overdue(&self, goal: &mut Goal, today: NaiveDate, now: Time) -> bool {
        if goal.status == GoalStatus::Active && goal.target_date < today {
            goal.status = GoalStatus::Overdue;
            goal.updated_at = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skillmatrix_core::{SkillId, UserId};

    fn now() -> Time {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn goal(target: RatingLevel, current: RatingLevel) -> Goal {
        Goal::new(
            UserId::new("emp-1"),
            SkillId::new("rust"),
            None,
            target,
            current,
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            now(),
        )
    }

    #[test]
    fn test_low_medium_high_sequence() {
        let calc = GoalProgressCalculator;
        let mut g = goal(RatingLevel::High, RatingLevel::Low);
        assert_eq!(g.progress_percentage, 33);

        let step = calc.update_progress(&g, RatingLevel::Medium, now()).unwrap();
        assert_eq!(step.goal.progress_percentage, 67);
        assert_eq!(step.goal.status, GoalStatus::Active);
        assert_eq!(step.outcome, ProgressOutcome::Unchanged);
        assert_eq!(step.history.milestone, Some(Milestone::FiftyPercent));
        g = step.goal;

        let step = calc.update_progress(&g, RatingLevel::High, now()).unwrap();
        assert_eq!(step.goal.progress_percentage, 100);
        assert_eq!(step.goal.status, GoalStatus::Completed);
        assert_eq!(step.goal.completed_at, Some(now()));
        // 80% is crossed in the same step, completion wins
        assert_eq!(step.outcome, ProgressOutcome::Completed);
        assert_eq!(step.history.milestone, Some(Milestone::Completed));
        assert_eq!(step.history.previous_rating, RatingLevel::Medium);
    }

    #[test]
    fn test_completed_goal_rejects_updates() {
        let calc = GoalProgressCalculator;
        let g = goal(RatingLevel::Medium, RatingLevel::Low);
        let done = calc.update_progress(&g, RatingLevel::High, now()).unwrap().goal;
        assert_eq!(done.progress_percentage, 100);
        assert!(calc.update_progress(&done, RatingLevel::High, now()).is_err());
    }

    #[test]
    fn test_overdue_goal_can_still_complete() {
        let calc = GoalProgressCalculator;
        let mut g = goal(RatingLevel::High, RatingLevel::Low);
        assert!(calc.check_overdue(&mut g, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), now()));
        let step = calc.update_progress(&g, RatingLevel::High, now()).unwrap();
        assert_eq!(step.goal.status, GoalStatus::Completed);
    }

    #[test]
    fn test_lower_rating_reduces_progress() {
        let calc = GoalProgressCalculator;
        let g = goal(RatingLevel::High, RatingLevel::Medium);
        let step = calc.update_progress(&g, RatingLevel::Low, now()).unwrap();
        assert_eq!(step.goal.progress_percentage, 33);
        assert_eq!(step.history.milestone, None);
        assert_eq!(step.outcome, ProgressOutcome::Unchanged);
    }

    #[test]
    fn test_milestone_priority() {
        assert_eq!(milestone_for(33, 100), Some(Milestone::Completed));
        assert_eq!(milestone_for(67, 85), Some(Milestone::EightyPercent));
        assert_eq!(milestone_for(10, 85), Some(Milestone::EightyPercent));
        assert_eq!(milestone_for(33, 67), Some(Milestone::FiftyPercent));
        assert_eq!(milestone_for(50, 67), None);
        assert_eq!(milestone_for(85, 90), None);
    }

    #[test]
    fn test_check_overdue_idempotent() {
        let calc = GoalProgressCalculator;
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut g = goal(RatingLevel::High, RatingLevel::Low);

        assert!(calc.check_overdue(&mut g, today, now()));
        assert_eq!(g.status, GoalStatus::Overdue);
        let once = g.clone();

        let later = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        assert!(!calc.check_overdue(&mut g, today, later));
        assert_eq!(g, once);
    }

    #[test]
    fn test_check_overdue_ignores_due_today_and_closed_goals() {
        let calc = GoalProgressCalculator;
        let mut g = goal(RatingLevel::High, RatingLevel::Low);
        let due = g.target_date;
        assert!(!calc.check_overdue(&mut g, due, now()));

        g.status = GoalStatus::Cancelled;
        assert!(!calc.check_overdue(&mut g, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), now()));
        assert_eq!(g.status, GoalStatus::Cancelled);
    }
}
