//! Migration positions and their total order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a migration: an optional collection scope plus an author-assigned number.
///
/// Versions order by scope first (the global scope sorts before every named scope, named
/// scopes compare lexicographically) and by number second. The derived `Ord` relies on
/// field order and on `None < Some(_)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationVersion {
    pub scope: Option<String>,
    pub number: i64,
}

impl MigrationVersion {
    pub fn new(scope: Option<&str>, number: i64) -> Self {
        Self {
            scope: scope.map(str::to_string),
            number,
        }
    }

    pub fn global(number: i64) -> Self {
        Self { scope: None, number }
    }

    pub fn scoped(scope: impl Into<String>, number: i64) -> Self {
        Self {
            scope: Some(scope.into()),
            number,
        }
    }

    /// Lowest version within `scope`.
    pub fn min(scope: Option<&str>) -> Self {
        Self::new(scope, i64::MIN)
    }

    /// Highest version within `scope`.
    pub fn max(scope: Option<&str>) -> Self {
        Self::new(scope, i64::MAX)
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn in_scope(&self, scope: Option<&str>) -> bool {
        self.scope() == scope
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope}#{}", self.number),
            None => write!(f, "#{}", self.number),
        }
    }
}

/// How far an `up` pass advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpTarget {
    /// Every discovered migration in the scope.
    #[default]
    Latest,
    /// Migrations numbered at or below this ceiling.
    Version(i64),
}

impl UpTarget {
    pub fn upper_bound(self, scope: Option<&str>) -> MigrationVersion {
        match self {
            UpTarget::Latest => MigrationVersion::max(scope),
            UpTarget::Version(number) => MigrationVersion::new(scope, number),
        }
    }
}

impl From<Option<i64>> for UpTarget {
    fn from(value: Option<i64>) -> Self {
        value.map_or(UpTarget::Latest, UpTarget::Version)
    }
}

/// How far a `down` pass unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownTarget {
    /// Roll back every applied migration in the scope.
    #[default]
    All,
    /// Roll back everything numbered above this version; the version itself stays applied.
    Version(i64),
}

impl DownTarget {
    /// Lowest version eligible for rollback, or `None` when nothing can sit above the target.
    pub fn lower_bound(self, scope: Option<&str>) -> Option<MigrationVersion> {
        match self {
            DownTarget::All => Some(MigrationVersion::min(scope)),
            DownTarget::Version(number) => number
                .checked_add(1)
                .map(|next| MigrationVersion::new(scope, next)),
        }
    }
}

impl From<Option<i64>> for DownTarget {
    fn from(value: Option<i64>) -> Self {
        value.map_or(DownTarget::All, DownTarget::Version)
    }
}
