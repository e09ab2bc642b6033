//! Scripted driver mock for runner and executor tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ratchet_core::driver::MigrationDriver;
use ratchet_core::error::DriverError;
use ratchet_core::migration::Migration;
use tokio_util::sync::CancellationToken;

/// A recorded driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Connect,
    EnsureTable,
    TableExists,
    CurrentVersion,
    Apply(i64),
    Close,
}

#[derive(Default)]
struct MockState {
    ledger: Vec<i64>,
    calls: Vec<DriverCall>,
    connected: bool,
    table: bool,
    connect_failures: u32,
    fail_table_setup: bool,
    fail_version_query: bool,
    apply_failure: Option<(i64, u32)>,
    fail_close: bool,
    hang_close: bool,
    cancel_after: Option<(i64, CancellationToken)>,
}

/// In-memory driver whose ledger and failures are scripted by the test.
///
/// Clones share state, so a test can keep one handle and give another to
/// the code under test.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create a mock with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend versions `1..=version` were applied already.
    pub fn with_applied(self, version: i64) -> Self {
        let mut state = self.state();
        state.ledger = (1..=version).collect();
        state.table = true;
        drop(state);
        self
    }

    /// Fail every connect.
    pub fn fail_connect(self) -> Self {
        self.fail_connect_times(u32::MAX)
    }

    /// Fail the next `times` connects.
    pub fn fail_connect_times(self, times: u32) -> Self {
        self.state().connect_failures = times;
        self
    }

    pub fn fail_table_setup(self) -> Self {
        self.state().fail_table_setup = true;
        self
    }

    pub fn fail_version_query(self) -> Self {
        self.state().fail_version_query = true;
        self
    }

    /// Fail every apply of `version`.
    pub fn fail_apply_at(self, version: i64) -> Self {
        self.fail_apply_times(version, u32::MAX)
    }

    /// Fail the next `times` applies of `version`.
    pub fn fail_apply_times(self, version: i64, times: u32) -> Self {
        self.state().apply_failure = Some((version, times));
        self
    }

    pub fn fail_close(self) -> Self {
        self.state().fail_close = true;
        self
    }

    /// Make `close` never complete.
    pub fn hang_close(self) -> Self {
        self.state().hang_close = true;
        self
    }

    /// Whether the ledger table has been created.
    pub fn has_table(&self) -> bool {
        self.state().table
    }

    /// Cancel `token` right after `version` commits.
    pub fn cancel_after(self, version: i64, token: CancellationToken) -> Self {
        self.state().cancel_after = Some((version, token));
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    /// Versions recorded in the ledger, in commit order.
    pub fn applied_versions(&self) -> Vec<i64> {
        self.state().ledger.clone()
    }

    /// Versions passed to `apply_migration`, successful or not.
    pub fn attempted_versions(&self) -> Vec<i64> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Apply(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn ledger_version(&self) -> i64 {
        self.state().ledger.iter().copied().max().unwrap_or(0)
    }

    pub fn count(&self, call: DriverCall) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MigrationDriver for MockDriver {
    fn dialect(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(DriverCall::Connect);
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(DriverError::Connection("mock connection refused".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn ensure_migrations_table(&mut self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(DriverCall::EnsureTable);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        if state.fail_table_setup {
            return Err(DriverError::TableSetup("mock permission denied".into()));
        }
        state.table = true;
        Ok(())
    }

    async fn migrations_table_exists(&mut self) -> Result<bool, DriverError> {
        let mut state = self.state();
        state.calls.push(DriverCall::TableExists);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        if state.fail_version_query {
            return Err(DriverError::VersionQuery("mock query failed".into()));
        }
        Ok(state.table)
    }

    async fn current_version(&mut self) -> Result<i64, DriverError> {
        let mut state = self.state();
        state.calls.push(DriverCall::CurrentVersion);
        if !state.connected {
            return Err(DriverError::NotConnected);
        }
        if state.fail_version_query {
            return Err(DriverError::VersionQuery("mock query failed".into()));
        }
        Ok(state.ledger.iter().copied().max().unwrap_or(0))
    }

    async fn apply_migration(&mut self, migration: &Migration) -> Result<(), DriverError> {
        let mut state = self.state();
        state.calls.push(DriverCall::Apply(migration.version));
        if !state.connected {
            return Err(DriverError::NotConnected);
        }

        if let Some((version, remaining)) = state.apply_failure.as_mut() {
            if *version == migration.version && *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::apply(migration, "mock syntax error"));
            }
        }

        state.ledger.push(migration.version);

        if let Some((version, token)) = &state.cancel_after {
            if *version == migration.version {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let hang = {
            let mut state = self.state();
            state.calls.push(DriverCall::Close);
            state.connected = false;
            if state.fail_close {
                return Err(DriverError::Close("mock socket already closed".into()));
            }
            state.hang_close
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
