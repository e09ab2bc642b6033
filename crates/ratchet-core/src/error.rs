use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed source error carried by driver failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for ratchet operations.
#[derive(Error, Debug)]
pub enum RatchetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Migration run cancelled")]
    Cancelled,

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RatchetError {
    /// Whether the executor should try the unit again after this error.
    ///
    /// Only driver-side failures are transient. Load and configuration errors
    /// will fail the same way on every attempt, and cancellation ends the unit.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Driver(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether this error came from cancellation or the unit deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded(_))
    }
}

/// Errors raised while turning a source into a migration set.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no migrations found")]
    EmptySource,

    #[error("invalid migration file name format for file: {file} (the format is <version>_<name>.sql)")]
    InvalidNameFormat { file: String },

    #[error("invalid migration version in file {file}: {reason}")]
    InvalidVersion { file: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },
}

/// Errors raised by a [`MigrationDriver`](crate::driver::MigrationDriver).
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to connect: {0}")]
    Connection(#[source] BoxError),

    #[error("failed to create migrations table: {0}")]
    TableSetup(#[source] BoxError),

    #[error("failed to get current version: {0}")]
    VersionQuery(#[source] BoxError),

    #[error("failed to apply migration {version} ('{name}'): {source}")]
    Apply {
        version: i64,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to close connection: {0}")]
    Close(#[source] BoxError),

    #[error("driver not connected")]
    NotConnected,
}

impl DriverError {
    /// Construct an apply failure for the given migration.
    pub fn apply(
        migration: &crate::migration::Migration,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Apply {
            version: migration.version,
            name: migration.name.clone(),
            source: source.into(),
        }
    }

    /// The failing migration version, for apply errors.
    pub fn failed_version(&self) -> Option<i64> {
        match self {
            Self::Apply { version, .. } => Some(*version),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Close(_) | Self::NotConnected)
    }
}

/// Result type alias using RatchetError.
pub type Result<T> = std::result::Result<T, RatchetError>;
