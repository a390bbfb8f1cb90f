//! Skill catalog - categories, skills and subskills maintained by admins.

use serde::{Deserialize, Serialize};
use crate::id::{CategoryId, SkillId, SubskillId};

/// Grouping of skills for rollup reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: CategoryId,
    /// Display name
    pub name: String,
}

/// A ratable skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique identifier
    pub id: SkillId,
    /// Owning category
    pub category_id: CategoryId,
    /// Display name
    pub name: String,
}

/// A finer-grained part of a skill, rated on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subskill {
    /// Unique identifier
    pub id: SubskillId,
    /// Parent skill
    pub skill_id: SkillId,
    /// Display name
    pub name: String,
}

/// The whole catalog as fetched from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCatalog {
    /// Categories
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Skills
    #[serde(default)]
    pub skills: Vec<Skill>,
    /// Subskills
    #[serde(default)]
    pub subskills: Vec<Subskill>,
}

impl SkillCatalog {
    /// Look up a category.
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == id)
    }

    /// Look up a skill.
    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| &s.id == id)
    }

    /// Skills belonging to a category.
    pub fn skills_in(&self, category_id: &CategoryId) -> Vec<Skill> {
        self.skills
            .iter()
            .filter(|s| &s.category_id == category_id)
            .cloned()
            .collect()
    }

    /// Subskills of a skill.
    pub fn subskills_of(&self, skill_id: &SkillId) -> impl Iterator<Item = &Subskill> {
        let skill_id = skill_id.clone();
        self.subskills.iter().filter(move |s| s.skill_id == skill_id)
    }

    /// Whether `subskill_id` (or the bare skill when `None`) is a ratable unit.
    pub fn has_unit(&self, skill_id: &SkillId, subskill_id: Option<&SubskillId>) -> bool {
        if self.skill(skill_id).is_none() {
            return false;
        }
        match subskill_id {
            Some(sub) => self.subskills_of(skill_id).any(|s| &s.id == sub),
            None => self.subskills_of(skill_id).next().is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SkillCatalog {
        SkillCatalog {
            categories: vec![Category { id: CategoryId::new("backend"), name: "Backend".into() }],
            skills: vec![
                Skill { id: SkillId::new("rust"), category_id: CategoryId::new("backend"), name: "Rust".into() },
                Skill { id: SkillId::new("sql"), category_id: CategoryId::new("backend"), name: "SQL".into() },
            ],
            subskills: vec![Subskill { id: SubskillId::new("async"), skill_id: SkillId::new("rust"), name: "Async".into() }],
        }
    }

    #[test]
    fn test_has_unit() {
        let c = catalog();
        assert!(c.has_unit(&SkillId::new("rust"), Some(&SubskillId::new("async"))));
        // skills with subskills are rated per subskill
        assert!(!c.has_unit(&SkillId::new("rust"), None));
        assert!(c.has_unit(&SkillId::new("sql"), None));
        assert!(!c.has_unit(&SkillId::new("go"), None));
        assert_eq!(c.skills_in(&CategoryId::new("backend")).len(), 2);
    }
}
