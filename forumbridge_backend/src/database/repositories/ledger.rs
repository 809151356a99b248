use crate::database::models::LedgerEntry;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteLedgerRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::LedgerRepository for SqliteLedgerRepository<'conn> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM ledger WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn insert(&self, key: &str, value: &str, written_at: &str) -> Result<bool> {
        // First writer wins; records are never rewritten.
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO ledger (key, value, written_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![key, value, written_at],
        )?;
        Ok(changed > 0)
    }

    fn count_with_prefix(&self, prefix: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_recent(&self, prefix: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT key, value, written_at FROM ledger
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY written_at DESC, key ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![prefix, limit as i64], |row| {
            Ok(LedgerEntry {
                key: row.get(0)?,
                value: row.get(1)?,
                written_at: row.get(2)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
