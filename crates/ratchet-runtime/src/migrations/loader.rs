//! Loads `<version>_<name>.sql` files into a [`MigrationSet`].
//!
//! Only the top level of a source is read; sub-directories are skipped.
//! Files ending in `.fixture.sql` are never migrations themselves, but when
//! fixtures are enabled their contents are attached to the migration with the
//! same stem (`3_seed.sql` + `3_seed.fixture.sql`).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ratchet_core::error::LoadError;
use ratchet_core::migration::{Migration, MigrationSet};
use tracing::debug;

const SQL_SUFFIX: &str = ".sql";
const FIXTURE_SUFFIX: &str = ".fixture.sql";

/// A top-level entry of a migration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub is_dir: bool,
}

/// A flat, filesystem-like collection of migration files.
pub trait MigrationSource {
    /// Where the files come from, for log and error messages.
    fn describe(&self) -> String;

    /// Top-level entries in discovery order.
    fn entries(&self) -> Result<Vec<SourceEntry>, LoadError>;

    /// Read a file by its entry name.
    fn read(&self, name: &str) -> Result<String, LoadError>;

    /// Whether a regular file with this name exists.
    fn exists(&self, name: &str) -> bool;
}

/// Migrations stored in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MigrationSource for DirSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn entries(&self) -> Result<Vec<SourceEntry>, LoadError> {
        let read_failure = |source| LoadError::ReadFailure {
            path: self.root.clone(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(read_failure)? {
            let entry = entry.map_err(read_failure)?;
            let is_dir = entry.file_type().map_err(read_failure)?.is_dir();
            entries.push(SourceEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(entries)
    }

    fn read(&self, name: &str) -> Result<String, LoadError> {
        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|source| LoadError::ReadFailure { path, source })
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// Migrations held in memory, e.g. compiled in with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }

    /// Add an (ignored) sub-directory entry.
    pub fn with_dir(mut self, name: impl Into<String>) -> Self {
        self.dirs.insert(name.into());
        self
    }
}

impl MigrationSource for MemorySource {
    fn describe(&self) -> String {
        "<memory>".to_string()
    }

    fn entries(&self) -> Result<Vec<SourceEntry>, LoadError> {
        let files = self.files.keys().map(|name| SourceEntry {
            name: name.clone(),
            is_dir: false,
        });
        let dirs = self.dirs.iter().map(|name| SourceEntry {
            name: name.clone(),
            is_dir: true,
        });
        Ok(files.chain(dirs).collect())
    }

    fn read(&self, name: &str) -> Result<String, LoadError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::ReadFailure {
                path: PathBuf::from(name),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// Load migrations from a directory.
pub fn load_migrations_from_dir(
    dir: impl Into<PathBuf>,
    fixtures: bool,
) -> Result<MigrationSet, LoadError> {
    load_migrations(&DirSource::new(dir), fixtures)
}

/// Load every migration at the top level of `source`.
///
/// The result keeps discovery order; the runner does the sorting.
pub fn load_migrations(
    source: &dyn MigrationSource,
    fixtures: bool,
) -> Result<MigrationSet, LoadError> {
    let mut migrations = Vec::new();

    for entry in source.entries()? {
        if entry.is_dir {
            continue;
        }

        let file_name = entry.name.as_str();
        if !file_name.ends_with(SQL_SUFFIX) || file_name.ends_with(FIXTURE_SUFFIX) {
            continue;
        }

        let (version, name) = parse_file_name(file_name)?;
        let mut migration = Migration::new(version, name, source.read(file_name)?);

        if fixtures {
            let stem = &file_name[..file_name.len() - SQL_SUFFIX.len()];
            let fixture_name = format!("{}{}", stem, FIXTURE_SUFFIX);
            if source.exists(&fixture_name) {
                migration.fixtures_sql = Some(source.read(&fixture_name)?);
            }
        }

        migrations.push(migration);
    }

    if migrations.is_empty() {
        return Err(LoadError::EmptySource);
    }

    debug!(
        "Loaded {} migrations from {}",
        migrations.len(),
        source.describe()
    );
    MigrationSet::new(migrations)
}

/// Split `<version>_<name>.sql` at the first underscore.
///
/// The returned name keeps everything after that underscore, suffix included.
pub fn parse_file_name(file_name: &str) -> Result<(i64, String), LoadError> {
    let stem = file_name.strip_suffix(SQL_SUFFIX).unwrap_or(file_name);

    let underscore = stem
        .find('_')
        .ok_or_else(|| LoadError::InvalidNameFormat {
            file: file_name.to_string(),
        })?;

    let version: i64 =
        stem[..underscore]
            .parse()
            .map_err(|e: std::num::ParseIntError| LoadError::InvalidVersion {
                file: file_name.to_string(),
                reason: e.to_string(),
            })?;

    if version <= 0 {
        return Err(LoadError::InvalidVersion {
            file: file_name.to_string(),
            reason: "version must be greater than 0".to_string(),
        });
    }

    Ok((version, file_name[underscore + 1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn by_version(set: &MigrationSet) -> BTreeMap<i64, Migration> {
        set.iter().map(|m| (m.version, m.clone())).collect()
    }

    #[test]
    fn test_parse_single_underscore() {
        let (version, name) = parse_file_name("1_createusers.sql").unwrap();
        assert_eq!(version, 1);
        assert_eq!(name, "createusers.sql");
    }

    #[test]
    fn test_parse_many_underscores() {
        let (version, name) = parse_file_name("10_add_index_to_users_table.sql").unwrap();
        assert_eq!(version, 10);
        assert_eq!(name, "add_index_to_users_table.sql");
    }

    #[test]
    fn test_parse_no_underscore() {
        let err = parse_file_name("invalid.sql").unwrap_err();
        assert!(matches!(err, LoadError::InvalidNameFormat { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_versions() {
        for file in [
            "abc_create_table.sql",
            "0_create_table.sql",
            "-1_create_table.sql",
            "1create_users.sql",
            "_create.sql",
        ] {
            let err = parse_file_name(file).unwrap_err();
            assert!(
                matches!(err, LoadError::InvalidVersion { .. }),
                "expected InvalidVersion for {file}, got {err}"
            );
        }
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1_create_users.sql"),
            "CREATE TABLE users (id INT PRIMARY KEY);",
        )
        .unwrap();
        fs::write(
            dir.path().join("2_create_posts.sql"),
            "CREATE TABLE posts (id INT PRIMARY KEY);",
        )
        .unwrap();
        fs::write(
            dir.path().join("3_add_index_to_users.sql"),
            "CREATE INDEX idx_users_id ON users(id);",
        )
        .unwrap();

        let set = load_migrations_from_dir(dir.path(), false).unwrap();
        assert_eq!(set.len(), 3);

        let map = by_version(&set);
        assert_eq!(map[&1].name, "create_users.sql");
        assert_eq!(map[&2].name, "create_posts.sql");
        assert_eq!(map[&3].name, "add_index_to_users.sql");
        assert!(map[&3].sql.contains("CREATE INDEX"));
        assert!(map[&1].fixtures_sql.is_none());
    }

    #[test]
    fn test_load_nonexistent_dir() {
        let err = load_migrations_from_dir("/non/existent/directory", false).unwrap_err();
        assert!(matches!(err, LoadError::ReadFailure { .. }));
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = TempDir::new().unwrap();
        let err = load_migrations_from_dir(dir.path(), false).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource));
        assert_eq!(err.to_string(), "no migrations found");
    }

    #[test]
    fn test_load_dir_with_only_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("archive").join("1_old.sql"), "SELECT 1;").unwrap();

        let err = load_migrations_from_dir(dir.path(), false).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource));
    }

    #[test]
    fn test_load_skips_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        fs::write(dir.path().join("subdir").join("2_nested.sql"), "SELECT 2;").unwrap();
        fs::write(dir.path().join("1_create_users.sql"), "SELECT 1;").unwrap();

        let set = load_migrations_from_dir(dir.path(), false).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].version, 1);
    }

    #[test]
    fn test_load_ignores_non_sql() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1_migration.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("readme.txt"), "Not a migration").unwrap();
        fs::write(dir.path().join("backup.sql.bak"), "Backup").unwrap();

        let set = load_migrations_from_dir(dir.path(), false).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_invalid_name_fails_whole_set() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1_ok.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("invalid.sql"), "SELECT 2;").unwrap();

        let err = load_migrations_from_dir(dir.path(), false).unwrap_err();
        assert!(matches!(err, LoadError::InvalidNameFormat { .. }));
    }

    #[test]
    fn test_fixtures_attached_when_enabled() {
        let source = MemorySource::new()
            .with_file("1_users.sql", "CREATE TABLE users (id INT);")
            .with_file("1_users.fixture.sql", "INSERT INTO users VALUES (1);")
            .with_file("2_posts.sql", "CREATE TABLE posts (id INT);");

        let set = load_migrations(&source, true).unwrap();
        assert_eq!(set.len(), 2);

        let map = by_version(&set);
        assert_eq!(
            map[&1].fixtures_sql.as_deref(),
            Some("INSERT INTO users VALUES (1);")
        );
        // A missing fixture file is not an error.
        assert!(map[&2].fixtures_sql.is_none());
    }

    #[test]
    fn test_fixtures_ignored_when_disabled() {
        let source = MemorySource::new()
            .with_file("1_users.sql", "CREATE TABLE users (id INT);")
            .with_file("1_users.fixture.sql", "INSERT INTO users VALUES (1);");

        let set = load_migrations(&source, false).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.as_slice()[0].fixtures_sql.is_none());
    }

    #[test]
    fn test_only_fixture_files_is_empty() {
        let source = MemorySource::new().with_file("1_users.fixture.sql", "INSERT 1");
        let err = load_migrations(&source, true).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource));
    }

    #[test]
    fn test_memory_source_skips_dirs() {
        let source = MemorySource::new().with_dir("1_looks_like_a.sql");
        let err = load_migrations(&source, false).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource));
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let source = MemorySource::new()
            .with_file("1_users.sql", "SELECT 1")
            .with_file("1_accounts.sql", "SELECT 2");

        let err = load_migrations(&source, false).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateVersion { version: 1, .. }));
    }
}
