//! Gamification profile - per-user XP, level and streak bookkeeping.

use serde::{Deserialize, Serialize};
use crate::id::UserId;
use crate::Time;

/// XP needed to advance one level.
pub const XP_PER_LEVEL: u32 = 100;

/// One profile per user, created lazily on first access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationProfile {
    /// Profile owner
    pub owner_id: UserId,

    /// Accumulated experience
    pub total_xp: u32,

    /// Level derived from `total_xp`
    pub level: u32,

    /// Goals ever created
    pub goals_set_count: u32,

    /// Goals ever completed
    pub goals_achieved_count: u32,

    /// Consecutive completed goals
    pub current_streak: u32,

    /// Longest streak so far
    pub best_streak: u32,

    /// Last update
    pub updated_at: Time,
}

/// A change to apply to a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationDelta {
    /// XP to add
    pub xp: u32,

    /// Goals created
    pub goals_set: u32,

    /// Goals completed
    pub goals_achieved: u32,
}

impl GamificationDelta {
    /// Combine two deltas.
    pub fn merge(self, other: GamificationDelta) -> Self {
        Self {
            xp: self.xp.saturating_add(other.xp),
            goals_set: self.goals_set.saturating_add(other.goals_set),
            goals_achieved: self.goals_achieved.saturating_add(other.goals_achieved),
        }
    }

    /// Whether applying this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl GamificationProfile {
    /// Fresh profile for a user.
    pub fn new(owner_id: UserId, now: Time) -> Self {
        Self {
            owner_id,
            total_xp: 0,
            level: 1,
            goals_set_count: 0,
            goals_achieved_count: 0,
            current_streak: 0,
            best_streak: 0,
            updated_at: now,
        }
    }

    /// Level for an XP total, starting at 1.
    pub fn level_for(total_xp: u32, xp_per_level: u32) -> u32 {
        total_xp / xp_per_level.max(1) + 1
    }

    /// Apply a delta, deriving level and streaks.
    pub fn apply(&mut self, delta: GamificationDelta, xp_per_level: u32, now: Time) {
        self.total_xp = self.total_xp.saturating_add(delta.xp);
        self.level = Self::level_for(self.total_xp, xp_per_level);
        self.goals_set_count = self.goals_set_count.saturating_add(delta.goals_set);
        self.goals_achieved_count = self.goals_achieved_count.saturating_add(delta.goals_achieved);
        self.current_streak = self.current_streak.saturating_add(delta.goals_achieved);
        self.best_streak = self.best_streak.max(self.current_streak);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_apply_updates_level_and_streak() {
        let mut profile = GamificationProfile::new(UserId::new("emp-1"), Utc::now());
        assert_eq!(profile.level, 1);

        profile.apply(GamificationDelta { xp: 10, goals_set: 1, goals_achieved: 0 }, XP_PER_LEVEL, Utc::now());
        profile.apply(GamificationDelta { xp: 50, goals_set: 0, goals_achieved: 1 }, XP_PER_LEVEL, Utc::now());
        profile.apply(GamificationDelta { xp: 50, goals_set: 0, goals_achieved: 1 }, XP_PER_LEVEL, Utc::now());

        assert_eq!(profile.total_xp, 110);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.goals_set_count, 1);
        assert_eq!(profile.goals_achieved_count, 2);
        assert_eq!(profile.current_streak, 2);
        assert_eq!(profile.best_streak, 2);
    }

    #[test]
    fn test_delta_merge() {
        let a = GamificationDelta { xp: 10, goals_set: 1, goals_achieved: 0 };
        let b = GamificationDelta { xp: 50, goals_set: 0, goals_achieved: 1 };
        assert_eq!(a.merge(b), GamificationDelta { xp: 60, goals_set: 1, goals_achieved: 1 });
        assert!(GamificationDelta::default().is_empty());
    }

    #[test]
    fn test_huge_xp_saturates() {
        let huge = GamificationDelta { xp: u32::MAX, goals_set: 0, goals_achieved: 1 };
        assert_eq!(huge.merge(huge).xp, u32::MAX);

        let mut profile = GamificationProfile::new(UserId::new("emp-1"), Utc::now());
        profile.apply(huge, XP_PER_LEVEL, Utc::now());
        profile.apply(huge, XP_PER_LEVEL, Utc::now());
        assert_eq!(profile.total_xp, u32::MAX);
        assert_eq!(profile.level, u32::MAX / XP_PER_LEVEL + 1);
        assert_eq!(profile.goals_achieved_count, 2);
    }
}
