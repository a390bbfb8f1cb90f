//! Notification and gamification side effects of workflow transitions.
//!
//! Every transition maps to at most one notification and at most one
//! gamification delta. The service packs them into the same change set as
//! the transition itself.

use skillmatrix_core::{
    GamificationDelta, Goal, Notification, NotificationType, Rating, Time, UserId,
};
use skillmatrix_progress::ProgressOutcome;
use crate::ServiceConfig;

/// A transition that may have side effects.
#[derive(Debug, Clone, Copy)]
pub enum TransitionEvent<'a> {
    /// Owner submitted a rating
    RatingSubmitted(&'a Rating),
    /// Approver accepted a rating
    RatingApproved(&'a Rating),
    /// Approver turned down a rating
    RatingRejected(&'a Rating),
    /// Owner created a goal
    GoalCreated(&'a Goal),
    /// A goal's progress was recomputed
    GoalProgressed {
        /// Goal after the update
        goal: &'a Goal,
        /// What the update amounted to
        outcome: ProgressOutcome,
    },
    /// A goal passed its target date
    GoalOverdue(&'a Goal),
}

/// Effects derived from one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffects {
    /// Notification to store, if any
    pub notification: Option<Notification>,

    /// Profile change for the owner, if any
    pub gamification: Option<(UserId, GamificationDelta)>,
}

fn unit_label(skill: &impl std::fmt::Display, subskill: Option<&impl std::fmt::Display>) -> String {
    match subskill {
        Some(sub) => format!("{} / {}", skill, sub),
        None => skill.to_string(),
    }
}

fn review_comment(rating: &Rating) -> &str {
    rating.review.as_ref().map(|r| r.comment.as_str()).unwrap_or("")
}

/// Compute the side effects of a transition.
pub fn side_effects(event: TransitionEvent<'_>, config: &ServiceConfig, now: Time) -> SideEffects {
    match event {
        TransitionEvent::RatingSubmitted(_) => SideEffects::default(),

        TransitionEvent::RatingApproved(rating) => SideEffects {
            notification: Some(Notification::new(
                rating.owner_id.clone(),
                NotificationType::Success,
                "Skill rating approved",
                format!(
                    "Your {} rating for {} was approved: {}",
                    rating.level,
                    unit_label(&rating.skill_id, rating.subskill_id.as_ref()),
                    review_comment(rating)
                ),
                now,
            )),
            gamification: None,
        },

        TransitionEvent::RatingRejected(rating) => SideEffects {
            notification: Some(Notification::new(
                rating.owner_id.clone(),
                NotificationType::Warning,
                "Skill rating rejected",
                format!(
                    "Your {} rating for {} was rejected: {}",
                    rating.level,
                    unit_label(&rating.skill_id, rating.subskill_id.as_ref()),
                    review_comment(rating)
                ),
                now,
            )),
            gamification: None,
        },

        TransitionEvent::GoalCreated(goal) => SideEffects {
            notification: None,
            gamification: Some((
                goal.owner_id.clone(),
                GamificationDelta {
                    xp: config.xp_goal_created,
                    goals_set: 1,
                    goals_achieved: 0,
                },
            )),
        },

        TransitionEvent::GoalProgressed { goal, outcome } => match outcome {
            ProgressOutcome::Completed => SideEffects {
                notification: Some(Notification::new(
                    goal.owner_id.clone(),
                    NotificationType::Success,
                    "Goal completed",
                    format!(
                        "You reached {} on {}. +{} XP",
                        goal.target_rating,
                        unit_label(&goal.skill_id, goal.subskill_id.as_ref()),
                        config.xp_goal_completed
                    ),
                    now,
                )),
                gamification: Some((
                    goal.owner_id.clone(),
                    GamificationDelta {
                        xp: config.xp_goal_completed,
                        goals_set: 0,
                        goals_achieved: 1,
                    },
                )),
            },
            ProgressOutcome::EightyPercent => SideEffects {
                notification: Some(Notification::new(
                    goal.owner_id.clone(),
                    NotificationType::Info,
                    "80% milestone reached",
                    format!(
                        "Your goal for {} is {}% complete",
                        unit_label(&goal.skill_id, goal.subskill_id.as_ref()),
                        goal.progress_percentage
                    ),
                    now,
                )),
                gamification: None,
            },
            ProgressOutcome::Unchanged => SideEffects::default(),
        },

        TransitionEvent::GoalOverdue(goal) => SideEffects {
            notification: Some(Notification::new(
                goal.owner_id.clone(),
                NotificationType::Warning,
                "Goal overdue",
                format!(
                    "Your goal for {} passed its target date {}",
                    unit_label(&goal.skill_id, goal.subskill_id.as_ref()),
                    goal.target_date
                ),
                now,
            )),
            gamification: None,
        },
    }
}
