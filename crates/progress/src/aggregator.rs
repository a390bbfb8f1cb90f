//! Category rollup of skill and subskill ratings.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use skillmatrix_core::{Rating, RatingLevel, RatingStatus, Skill, SkillId, Subskill, SubskillId};

/// Approved ratings per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCounts {
    /// Approved low ratings
    pub low: usize,
    /// Approved medium ratings
    pub medium: usize,
    /// Approved high ratings
    pub high: usize,
}

impl RatingCounts {
    fn add(&mut self, level: RatingLevel) {
        match level {
            RatingLevel::Low => self.low += 1,
            RatingLevel::Medium => self.medium += 1,
            RatingLevel::High => self.high += 1,
        }
    }
}

/// Derived progress of one category, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProgressSummary {
    /// Ratable units in the category
    pub total_items: usize,
    /// Units with an approved rating
    pub rated_items: usize,
    /// `round(100 * rated / total)`, 0 for an empty category
    pub progress_percentage: u8,
    /// Levels of the approved units
    pub rating_counts: RatingCounts,
    /// Units whose current rating is approved
    pub approved_count: usize,
    /// Units whose current rating awaits approval
    pub pending_count: usize,
    /// Units whose current rating was rejected
    pub rejected_count: usize,
}

fn precedence(status: RatingStatus) -> Option<u8> {
    match status {
        RatingStatus::Approved => Some(3),
        RatingStatus::Submitted => Some(2),
        RatingStatus::Rejected => Some(1),
        RatingStatus::Draft => None,
    }
}

/// Pick the rating that counts for one unit.
///
/// Approved beats submitted beats rejected; drafts never count. Within a
/// status the most recent decision (or submission) wins and the id breaks
/// exact ties, so the choice does not depend on input order.
pub fn current_rating_for_unit<'a, I>(ratings: I) -> Option<&'a Rating>
where
    I: IntoIterator<Item = &'a Rating>,
{
    ratings
        .into_iter()
        .filter_map(|r| precedence(r.status).map(|p| (p, r)))
        .max_by(|(pa, a), (pb, b)| {
            pa.cmp(pb)
                .then(a.status_time().cmp(&b.status_time()))
                .then(a.id.cmp(&b.id))
        })
        .map(|(_, r)| r)
}

/// Roll up the ratings of one category.
///
/// Skills with subskills contribute one unit per subskill; other skills are a
/// single unit. Ratings for units outside the category are ignored. Callers
/// pass the ratings of a single owner.
pub fn aggregate(
    category_skills: &[Skill],
    all_subskills: &[Subskill],
    all_ratings: &[Rating],
) -> CategoryProgressSummary {
    let mut by_unit: HashMap<(&SkillId, Option<&SubskillId>), Vec<&Rating>> = HashMap::new();
    for rating in all_ratings {
        by_unit
            .entry((&rating.skill_id, rating.subskill_id.as_ref()))
            .or_default()
            .push(rating);
    }

    let mut units: Vec<(&SkillId, Option<&SubskillId>)> = Vec::new();
    for skill in category_skills {
        let mut subskills = all_subskills
            .iter()
            .filter(|s| s.skill_id == skill.id)
            .peekable();
        if subskills.peek().is_none() {
            units.push((&skill.id, None));
        } else {
            units.extend(subskills.map(|s| (&skill.id, Some(&s.id))));
        }
    }

    let mut summary = CategoryProgressSummary {
        total_items: units.len(),
        ..Default::default()
    };

    for unit in &units {
        let Some(ratings) = by_unit.get(unit) else {
            continue;
        };
        let Some(current) = current_rating_for_unit(ratings.iter().copied()) else {
            continue;
        };
        match current.status {
            RatingStatus::Approved => {
                summary.approved_count += 1;
                summary.rating_counts.add(current.level);
            }
            RatingStatus::Submitted => summary.pending_count += 1,
            RatingStatus::Rejected => summary.rejected_count += 1,
            RatingStatus::Draft => {}
        }
    }

    summary.rated_items = summary.approved_count;
    summary.progress_percentage = if summary.total_items > 0 {
        (100.0 * summary.rated_items as f64 / summary.total_items as f64).round() as u8
    } else {
        0
    };
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use skillmatrix_core::{CategoryId, Time, UserId};

    fn t(minutes: i64) -> Time {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn skill(id: &str) -> Skill {
        Skill { id: SkillId::new(id), category_id: CategoryId::new("eng"), name: id.to_string() }
    }

    fn subskill(skill: &str, id: &str) -> Subskill {
        Subskill { id: SubskillId::new(id), skill_id: SkillId::new(skill), name: id.to_string() }
    }

    fn rating(
        skill: &str,
        subskill: Option<&str>,
        level: RatingLevel,
        status: RatingStatus,
        at: i64,
    ) -> Rating {
        let mut r = Rating::draft(
            UserId::new("emp-1"),
            SkillId::new(skill),
            subskill.map(SubskillId::new),
            level,
            t(at),
        );
        if status != RatingStatus::Draft {
            r.submit("evidence", t(at)).unwrap();
        }
        match status {
            RatingStatus::Approved => r.approve(UserId::new("mgr"), "ok", t(at + 1)).unwrap(),
            RatingStatus::Rejected => r.reject(UserId::new("mgr"), "no", t(at + 1)).unwrap(),
            _ => {}
        }
        r
    }

    #[test]
    fn test_two_subskills_one_approved_one_pending() {
        let skills = vec![skill("rust")];
        let subskills = vec![subskill("rust", "async"), subskill("rust", "macros")];
        let ratings = vec![
            rating("rust", Some("async"), RatingLevel::High, RatingStatus::Approved, 0),
            rating("rust", Some("macros"), RatingLevel::Medium, RatingStatus::Submitted, 5),
        ];

        let summary = aggregate(&skills, &subskills, &ratings);
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.rated_items, 1);
        assert_eq!(summary.progress_percentage, 50);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.approved_count, 1);
        assert_eq!(summary.rejected_count, 0);
        assert_eq!(summary.rating_counts, RatingCounts { low: 0, medium: 0, high: 1 });
    }

    #[test]
    fn test_approved_takes_precedence_over_newer_rows() {
        let old_approved = rating("sql", None, RatingLevel::Low, RatingStatus::Approved, 0);
        let newer_pending = rating("sql", None, RatingLevel::High, RatingStatus::Submitted, 50);
        let newer_rejected = rating("sql", None, RatingLevel::High, RatingStatus::Rejected, 60);
        let draft = rating("sql", None, RatingLevel::High, RatingStatus::Draft, 70);
        let all = [&newer_rejected, &draft, &old_approved, &newer_pending];

        let current = current_rating_for_unit(all.iter().copied()).unwrap();
        assert_eq!(current.id, old_approved.id);
    }

    #[test]
    fn test_most_recent_approval_wins() {
        let first = rating("sql", None, RatingLevel::Low, RatingStatus::Approved, 0);
        let second = rating("sql", None, RatingLevel::High, RatingStatus::Approved, 30);
        let summary = aggregate(&[skill("sql")], &[], &[second.clone(), first.clone()]);
        assert_eq!(summary.rating_counts, RatingCounts { low: 0, medium: 0, high: 1 });
        assert_eq!(current_rating_for_unit([&first, &second]).unwrap().id, second.id);
    }

    #[test]
    fn test_pending_over_rejected_and_drafts_ignored() {
        let rejected = rating("go", None, RatingLevel::Low, RatingStatus::Rejected, 40);
        let pending = rating("go", None, RatingLevel::Medium, RatingStatus::Submitted, 10);
        assert_eq!(current_rating_for_unit([&rejected, &pending]).unwrap().id, pending.id);

        let draft = rating("go", None, RatingLevel::Medium, RatingStatus::Draft, 10);
        assert!(current_rating_for_unit([&draft]).is_none());
        let summary = aggregate(&[skill("go")], &[], &[draft]);
        assert_eq!(summary.total_items, 1);
        assert_eq!(summary.approved_count + summary.pending_count + summary.rejected_count, 0);
    }

    #[test]
    fn test_skill_level_rating_ignored_when_subskills_exist() {
        let skills = vec![skill("rust"), skill("sql")];
        let subskills = vec![subskill("rust", "async")];
        let ratings = vec![
            rating("rust", None, RatingLevel::High, RatingStatus::Approved, 0),
            rating("sql", None, RatingLevel::Medium, RatingStatus::Approved, 0),
            rating("java", None, RatingLevel::Medium, RatingStatus::Approved, 0),
        ];
        let summary = aggregate(&skills, &subskills, &ratings);
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.approved_count, 1);
        assert_eq!(summary.rating_counts.medium, 1);
    }

    #[test]
    fn test_empty_category() {
        assert_eq!(aggregate(&[], &[], &[]), CategoryProgressSummary::default());
    }

    #[test]
    fn test_permutation_invariant() {
        let skills = vec![skill("rust"), skill("sql"), skill("go")];
        let subskills = vec![subskill("rust", "async"), subskill("rust", "macros")];
        let ratings = vec![
            rating("rust", Some("async"), RatingLevel::High, RatingStatus::Approved, 0),
            rating("rust", Some("async"), RatingLevel::Low, RatingStatus::Approved, 0),
            rating("rust", Some("async"), RatingLevel::Medium, RatingStatus::Submitted, 3),
            rating("rust", Some("macros"), RatingLevel::Medium, RatingStatus::Rejected, 1),
            rating("rust", Some("macros"), RatingLevel::High, RatingStatus::Submitted, 2),
            rating("sql", None, RatingLevel::Low, RatingStatus::Rejected, 4),
            rating("sql", None, RatingLevel::Medium, RatingStatus::Rejected, 4),
            rating("go", None, RatingLevel::Medium, RatingStatus::Approved, 9),
        ];
        let expected = aggregate(&skills, &subskills, &ratings);

        // every rotation and its reverse
        for shift in 0..ratings.len() {
            let mut shuffled = ratings.clone();
            shuffled.rotate_left(shift);
            assert_eq!(aggregate(&skills, &subskills, &shuffled), expected);
            shuffled.reverse();
            assert_eq!(aggregate(&skills, &subskills, &shuffled), expected);
        }

        assert_eq!(expected.total_items, 4);
        assert_eq!(expected.approved_count, 2);
        assert_eq!(expected.pending_count, 1);
        assert_eq!(expected.rejected_count, 1);
        assert_eq!(expected.progress_percentage, 50);
    }

    #[test]
    fn test_summary_serializes() {
        let json = serde_json::to_value(CategoryProgressSummary::default()).unwrap();
        assert_eq!(json["rating_counts"]["high"], 0);
    }
}
