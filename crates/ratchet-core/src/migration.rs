//! Versioned migration records.

use std::collections::HashMap;

use crate::error::LoadError;

/// A single versioned migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Positive version, unique within a set. Version 0 means "nothing applied".
    pub version: i64,
    /// Label taken from the file name (everything after the first underscore).
    pub name: String,
    /// SQL applied by the runner.
    pub sql: String,
    /// Companion fixture SQL. Loaded on request, never run by the runner.
    pub fixtures_sql: Option<String>,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
            fixtures_sql: None,
        }
    }

    /// Attach fixture SQL.
    pub fn with_fixtures(mut self, fixtures_sql: impl Into<String>) -> Self {
        self.fixtures_sql = Some(fixtures_sql.into());
        self
    }
}

/// The migrations loaded for one target.
///
/// Kept in discovery order until [`MigrationSet::sort`] is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Build a set, rejecting duplicate versions.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, LoadError> {
        {
            let mut seen: HashMap<i64, &str> = HashMap::with_capacity(migrations.len());
            for m in &migrations {
                if let Some(first) = seen.insert(m.version, &m.name) {
                    return Err(LoadError::DuplicateVersion {
                        version: m.version,
                        first: first.to_string(),
                        second: m.name.clone(),
                    });
                }
            }
        }
        Ok(Self { migrations })
    }

    /// Stable ascending sort by version.
    pub fn sort(&mut self) {
        self.migrations.sort_by_key(|m| m.version);
    }

    /// A sorted copy of this set.
    pub fn sorted(&self) -> Self {
        let mut set = self.clone();
        set.sort();
        set
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    pub fn as_slice(&self) -> &[Migration] {
        &self.migrations
    }

    /// Highest version in the set, 0 when empty.
    pub fn latest_version(&self) -> i64 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    /// Migrations that carry fixture SQL, in set order.
    pub fn fixtures(&self) -> impl Iterator<Item = (&Migration, &str)> {
        self.migrations
            .iter()
            .filter_map(|m| m.fixtures_sql.as_deref().map(|sql| (m, sql)))
    }

    /// Whether the versions, once sorted, run 1, 2, 3, ... without gaps.
    pub fn is_contiguous(&self) -> bool {
        let mut versions: Vec<i64> = self.migrations.iter().map(|m| m.version).collect();
        versions.sort_unstable();
        versions
            .iter()
            .enumerate()
            .all(|(i, v)| *v == i as i64 + 1)
    }
}

impl IntoIterator for MigrationSet {
    type Item = Migration;
    type IntoIter = std::vec::IntoIter<Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.into_iter()
    }
}

impl<'a> IntoIterator for &'a MigrationSet {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}
