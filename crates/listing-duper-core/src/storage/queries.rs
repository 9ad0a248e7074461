use super::models::*;
use super::sqlite::Database;
use rusqlite::{params, OptionalExtension, Result};

impl Database {
    // ── Durable entries ──────────────────────────────────────────

    pub fn put_durable(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO durable_entry (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_durable(&self, key: &str) -> Result<Option<DurableEntry>> {
        self.connection()
            .query_row(
                "SELECT key, value, updated_at FROM durable_entry WHERE key = ?1",
                params![key],
                |row| {
                    Ok(DurableEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn delete_durable(&self, key: &str) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM durable_entry WHERE key = ?1", params![key])
    }

    pub fn durable_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT key FROM durable_entry WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(keys)
    }

    // ── Expiring cache entries ───────────────────────────────────

    pub fn put_cached(&self, key: &str, value: &str, expires_at: i64) -> Result<()> {
        self.connection().execute(
            "INSERT INTO cache_entry (key, value, expires_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Fetch an entry that has not expired at `now`.
    pub fn get_cached(&self, key: &str, now: i64) -> Result<Option<CacheEntry>> {
        self.connection()
            .query_row(
                "SELECT key, value, expires_at FROM cache_entry WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| {
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn delete_cached(&self, key: &str) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM cache_entry WHERE key = ?1", params![key])
    }

    pub fn cached_keys(&self, prefix: &str, now: i64) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT key FROM cache_entry \
             WHERE substr(key, 1, length(?1)) = ?1 AND expires_at > ?2 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix, now], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// Remove every cache entry expired at `now`. Returns the number removed.
    pub fn evict_expired(&self, now: i64) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM cache_entry WHERE expires_at <= ?1", params![now])
    }
}
