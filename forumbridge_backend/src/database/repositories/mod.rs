mod ledger;

use super::models::LedgerEntry;
use anyhow::Result;
use rusqlite::Connection;

pub trait LedgerRepository {
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Returns `false` when the key was already present and left untouched.
    fn insert(&self, key: &str, value: &str, written_at: &str) -> Result<bool>;
    fn count_with_prefix(&self, prefix: &str) -> Result<usize>;
    fn list_recent(&self, prefix: &str, limit: usize) -> Result<Vec<LedgerEntry>>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn ledger(&self) -> impl LedgerRepository + '_ {
        ledger::SqliteLedgerRepository { conn: self.conn }
    }
}
