//! Core type definitions for dicomdb.

use std::fmt;
use uuid::Uuid;

/// Depth in the record hierarchy.
///
/// A record at generation G is identified by a UID tuple of length G:
/// the database root carries no identifiers, an instance carries all
/// four. Behavior that differs per level dispatches on this enum
/// instead of a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Generation {
    /// Generation 0: the database root.
    Database,
    /// Generation 1: a patient.
    Patient,
    /// Generation 2: a study.
    Study,
    /// Generation 3: a series.
    Series,
    /// Generation 4: a single instance.
    Instance,
}

impl Generation {
    /// Returns the UID tuple length of this generation.
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Generation::Database => 0,
            Generation::Patient => 1,
            Generation::Study => 2,
            Generation::Series => 3,
            Generation::Instance => 4,
        }
    }

    /// Returns the generation with the given UID tuple length.
    #[must_use]
    pub const fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => Some(Generation::Database),
            1 => Some(Generation::Patient),
            2 => Some(Generation::Study),
            3 => Some(Generation::Series),
            4 => Some(Generation::Instance),
            _ => None,
        }
    }

    /// Returns the next generation down, if any.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        Self::from_depth(self.depth() + 1)
    }

    /// Returns the generation above, if any.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Generation::Database => None,
            _ => Self::from_depth(self.depth() - 1),
        }
    }

    /// Human-readable name of this generation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Generation::Database => "Database",
            Generation::Patient => "Patient",
            Generation::Study => "Study",
            Generation::Series => "Series",
            Generation::Instance => "Instance",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates a globally-unique identifier in dotted-decimal form.
///
/// Identifiers are derived from v4 UUIDs under the `2.25` arc, which
/// keeps them opaque strings with a vanishing collision probability.
/// Session-level uniqueness against existing rows is enforced by the
/// register on top of this.
#[must_use]
pub fn new_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}
