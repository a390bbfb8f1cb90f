//! Rating model - an employee's self-assessed proficiency and its review.

use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::id::{RatingId, SkillId, SubskillId, UserId};
use crate::Time;

/// Proficiency level of a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingLevel {
    /// Beginner
    Low,
    /// Working knowledge
    Medium,
    /// Expert
    High,
}

impl RatingLevel {
    /// All levels, lowest first.
    pub const ALL: [RatingLevel; 3] = [RatingLevel::Low, RatingLevel::Medium, RatingLevel::High];

    /// Ordinal used for progress arithmetic.
    pub fn rank(self) -> u32 {
        match self {
            RatingLevel::Low => 1,
            RatingLevel::Medium => 2,
            RatingLevel::High => 3,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            RatingLevel::Low => "low",
            RatingLevel::Medium => "medium",
            RatingLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RatingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RatingLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RatingLevel::Low),
            "medium" => Ok(RatingLevel::Medium),
            "high" => Ok(RatingLevel::High),
            other => Err(CoreError::validation(format!("unknown rating level '{}'", other))),
        }
    }
}

/// Rating workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStatus {
    /// Being edited by the owner
    Draft,
    /// Waiting for an approver
    Submitted,
    /// Accepted by an approver
    Approved,
    /// Turned down by an approver
    Rejected,
}

impl RatingStatus {
    /// Approved and rejected ratings are never mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, RatingStatus::Approved | RatingStatus::Rejected)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            RatingStatus::Draft => "draft",
            RatingStatus::Submitted => "submitted",
            RatingStatus::Approved => "approved",
            RatingStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RatingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The approver's decision on a submitted rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Who approved or rejected
    pub reviewer_id: UserId,

    /// Mandatory approver comment
    pub comment: String,

    /// When the decision was made
    pub reviewed_at: Time,
}

/// A skill or subskill rating owned by one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    /// Unique identifier
    pub id: RatingId,

    /// The rated employee
    pub owner_id: UserId,

    /// Rated skill
    pub skill_id: SkillId,

    /// Rated subskill, if the rating targets one
    pub subskill_id: Option<SubskillId>,

    /// Self-assessed level
    pub level: RatingLevel,

    /// Workflow status
    pub status: RatingStatus,

    /// Owner's justification, required once submitted
    pub self_comment: String,

    /// Approver decision, present iff approved or rejected
    pub review: Option<Review>,

    /// When created
    pub created_at: Time,

    /// When submitted
    pub submitted_at: Option<Time>,

    /// Last update
    pub updated_at: Time,
}

impl Rating {
    /// Create a new draft rating.
    pub fn draft(
        owner_id: UserId,
        skill_id: SkillId,
        subskill_id: Option<SubskillId>,
        level: RatingLevel,
        now: Time,
    ) -> Self {
        Self {
            id: RatingId::new(),
            owner_id,
            skill_id,
            subskill_id,
            level,
            status: RatingStatus::Draft,
            self_comment: String::new(),
            review: None,
            created_at: now,
            submitted_at: None,
            updated_at: now,
        }
    }

    /// Whether this rating targets the given skill/subskill unit.
    pub fn is_for_unit(&self, skill_id: &SkillId, subskill_id: Option<&SubskillId>) -> bool {
        &self.skill_id == skill_id && self.subskill_id.as_ref() == subskill_id
    }

    /// Submit the draft for approval.
    pub fn submit(&mut self, comment: &str, now: Time) -> Result<()> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(CoreError::validation("a comment is required to submit a rating"));
        }
        if self.status != RatingStatus::Draft {
            return Err(CoreError::validation(format!(
                "rating {} cannot be submitted from status {}",
                self.id, self.status
            )));
        }

        self.status = RatingStatus::Submitted;
        self.self_comment = comment.to_string();
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Approve a submitted rating.
    pub fn approve(&mut self, reviewer_id: UserId, comment: &str, now: Time) -> Result<()> {
        self.decide(RatingStatus::Approved, reviewer_id, comment, now)
    }

    /// Reject a submitted rating.
    pub fn reject(&mut self, reviewer_id: UserId, comment: &str, now: Time) -> Result<()> {
        self.decide(RatingStatus::Rejected, reviewer_id, comment, now)
    }

    fn decide(
        &mut self,
        outcome: RatingStatus,
        reviewer_id: UserId,
        comment: &str,
        now: Time,
    ) -> Result<()> {
        if self.status != RatingStatus::Submitted {
            return Err(CoreError::validation(format!(
                "rating {} is {}, only submitted ratings can be {}",
                self.id, self.status, outcome
            )));
        }
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(CoreError::validation("an approver comment is required"));
        }

        self.status = outcome;
        self.review = Some(Review {
            reviewer_id,
            comment: comment.to_string(),
            reviewed_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Check the status/field invariants, e.g. after loading a record.
    pub fn validate(&self) -> Result<()> {
        if self.status.is_terminal() != self.review.is_some() {
            return Err(CoreError::validation(format!(
                "rating {} is {} but review is {}",
                self.id,
                self.status,
                if self.review.is_some() { "present" } else { "missing" }
            )));
        }
        if self.status != RatingStatus::Draft
            && (self.self_comment.trim().is_empty() || self.submitted_at.is_none())
        {
            return Err(CoreError::validation(format!(
                "rating {} left draft without a comment or submission time",
                self.id
            )));
        }
        Ok(())
    }

    /// Time that orders ratings of the same status, newest wins.
    pub fn status_time(&self) -> Time {
        match (&self.review, self.submitted_at) {
            (Some(review), _) => review.reviewed_at,
            (None, Some(at)) => at,
            (None, None) => self.created_at,
        }
    }
}
