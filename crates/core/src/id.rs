//! Unique identifiers for SkillMatrix entities.
//!
//! Records created by the workflow get ULID identifiers. People and catalog
//! entries are owned by the external directory, so their ids are opaque
//! strings.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an externally assigned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

ulid_id!(
    /// Unique identifier for a Rating
    RatingId
);
ulid_id!(
    /// Unique identifier for a Goal
    GoalId
);
ulid_id!(
    /// Unique identifier for a Notification
    NotificationId
);
ulid_id!(
    /// Unique identifier for a goal progress history entry
    HistoryId
);

external_id!(
    /// Identifier of a person (employee, manager or admin)
    UserId
);
external_id!(
    /// Identifier of a skill in the catalog
    SkillId
);
external_id!(
    /// Identifier of a subskill in the catalog
    SubskillId
);
external_id!(
    /// Identifier of a skill category
    CategoryId
);
