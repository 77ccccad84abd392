//! Content-addressable result cache.
//!
//! Maps (content fingerprint, exact size, prompt fingerprint) to a
//! previously computed classification, persisted in SQLite. Entries carry
//! a TTL and a hit counter; expired rows are deleted lazily at read time,
//! and a periodic [`cleanup`](ResultCache::cleanup) sweep enforces both
//! the TTL and a storage cap by evicting the least-hit, oldest entries.
//!
//! # Keys
//!
//! The composite key is `{fingerprint}_{size}_{prompt_hash}`. Entries
//! written before the size was incorporated used
//! `{fingerprint}_{prompt_hash}`; lookups that supply a size fall back to
//! that legacy key once on a miss, so old entries stay readable without
//! migration.
//!
//! Items rejected by the duplicate index's filter never reach the cache;
//! the orchestrator consults the filter before every lookup or write.

mod pool;

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use doctriage_types::CacheConfig;

use crate::error::Result;
use pool::ConnectionPool;

/// Connections held per cache.
const POOL_SIZE: usize = 2;

/// A cache hit.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Structured classification payload.
    pub payload: serde_json::Value,
    /// Human-readable document summary.
    pub summary: String,
    /// Raw response body from the original call.
    pub raw_response: String,
    /// Hit count including this read.
    pub hit_count: u64,
}

/// Counts removed by one [`ResultCache::cleanup`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Rows removed because their TTL had expired.
    pub expired_deleted: usize,
    /// Rows evicted to get back under the storage cap.
    pub evicted: usize,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently stored.
    pub total_entries: u64,
    /// Sum of all hit counters.
    pub total_hits: u64,
    /// `(hits − entries) / hits × 100`: only hits beyond each entry's
    /// first write count.
    pub hit_rate: f64,
    /// Total bytes attributed to stored entries.
    pub stored_bytes: u64,
    /// Creation time of the oldest entry, seconds since the epoch.
    pub oldest_created_at: Option<i64>,
}

/// SQLite-backed result cache.
pub struct ResultCache {
    pool: ConnectionPool,
    ttl: Duration,
    max_size_bytes: u64,
}

impl ResultCache {
    /// Open (or create) the cache described by `config`.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        Self::with_settings(
            &config.db_path,
            Duration::from_secs(config.ttl_hours * 3600),
            config.max_size_mb * 1024 * 1024,
        )
    }

    /// Open a cache with explicit TTL and storage cap.
    pub fn with_settings(
        path: impl AsRef<Path>,
        ttl: Duration,
        max_size_bytes: u64,
    ) -> Result<Self> {
        let path = path.as_ref();
        // Schema setup happens before any worker runs; a plain short-lived
        // connection avoids threading async acquisition through `open`.
        Self::init_schema(path)?;
        let pool = ConnectionPool::open(path, POOL_SIZE)?;
        Ok(Self {
            pool,
            ttl,
            max_size_bytes,
        })
    }

    fn init_schema(path: &Path) -> Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                prompt_hash TEXT NOT NULL,
                payload TEXT NOT NULL,
                summary TEXT,
                raw_response TEXT,
                created_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 1,
                ttl_expiry INTEGER NOT NULL,
                file_size INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_cache_ttl ON cache_entries(ttl_expiry);
            CREATE INDEX IF NOT EXISTS idx_cache_hits ON cache_entries(hit_count DESC);
            ",
        )?;
        info!("result cache schema initialized");
        Ok(())
    }

    /// Composite cache key; the size-less form is the legacy variant.
    fn entry_key(fingerprint: &str, size: Option<u64>, prompt_hash: &str) -> String {
        match size {
            Some(size) => format!("{fingerprint}_{size}_{prompt_hash}"),
            None => format!("{fingerprint}_{prompt_hash}"),
        }
    }

    /// Look up a result.
    ///
    /// Tries the composite key first; when a size was supplied and the
    /// composite key misses, the legacy size-less key is tried once.
    /// Every hit increments the entry's hit counter. Expired entries are
    /// deleted and reported as misses.
    pub async fn get(
        &self,
        fingerprint: &str,
        size: Option<u64>,
        prompt_hash: &str,
    ) -> Result<Option<CacheEntry>> {
        let conn = self.pool.acquire().await;

        let primary = Self::entry_key(fingerprint, size, prompt_hash);
        if let Some(entry) = Self::lookup(&conn, &primary)? {
            return Ok(Some(entry));
        }
        if size.is_some() {
            let legacy = Self::entry_key(fingerprint, None, prompt_hash);
            if let Some(entry) = Self::lookup(&conn, &legacy)? {
                debug!(key = %legacy, "served from legacy cache key");
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn lookup(conn: &Connection, key: &str) -> Result<Option<CacheEntry>> {
        let row = conn
            .query_row(
                "SELECT payload, summary, raw_response, hit_count, ttl_expiry
                 FROM cache_entries WHERE cache_key = ?1",
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((payload, summary, raw_response, hit_count, ttl_expiry)) = row else {
            return Ok(None);
        };

        if ttl_expiry <= now_secs() {
            conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", [key])?;
            debug!(key, "expired cache entry deleted at read");
            return Ok(None);
        }

        conn.execute(
            "UPDATE cache_entries SET hit_count = hit_count + 1 WHERE cache_key = ?1",
            [key],
        )?;

        Ok(Some(CacheEntry {
            payload: serde_json::from_str(&payload)?,
            summary: summary.unwrap_or_default(),
            raw_response: raw_response.unwrap_or_default(),
            hit_count: hit_count as u64 + 1,
        }))
    }

    /// Store a result. Overwriting an existing key is idempotent.
    pub async fn put(
        &self,
        fingerprint: &str,
        size: Option<u64>,
        prompt_hash: &str,
        payload: &serde_json::Value,
        summary: &str,
        raw_response: &str,
    ) -> Result<()> {
        let key = Self::entry_key(fingerprint, size, prompt_hash);
        let now = now_secs();
        let expiry = now + self.ttl.as_secs() as i64;
        let conn = self.pool.acquire().await;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (cache_key, prompt_hash, payload, summary, raw_response,
              created_at, hit_count, ttl_expiry, file_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
            params![
                key,
                prompt_hash,
                serde_json::to_string(payload)?,
                summary,
                raw_response,
                now,
                expiry,
                size.map(|s| s as i64),
            ],
        )?;
        Ok(())
    }

    /// Sweep: delete expired rows, then evict least-hit, oldest rows
    /// until stored bytes fall back under the cap.
    pub async fn cleanup(&self) -> Result<CleanupStats> {
        let mut conn = self.pool.acquire().await;
        let tx = conn.transaction()?;

        let expired_deleted = tx.execute(
            "DELETE FROM cache_entries WHERE ttl_expiry <= ?1",
            [now_secs()],
        )?;

        let mut stored: u64 = tx.query_row(
            "SELECT COALESCE(SUM(file_size), 0) FROM cache_entries",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64;

        let mut evicted = 0usize;
        if stored > self.max_size_bytes {
            let victims: Vec<(String, u64)> = {
                let mut stmt = tx.prepare(
                    "SELECT cache_key, COALESCE(file_size, 0) FROM cache_entries
                     ORDER BY hit_count ASC, created_at ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            for (key, size) in victims {
                if stored <= self.max_size_bytes {
                    break;
                }
                tx.execute("DELETE FROM cache_entries WHERE cache_key = ?1", [&key])?;
                stored = stored.saturating_sub(size);
                evicted += 1;
            }
        }

        tx.commit()?;
        if expired_deleted > 0 || evicted > 0 {
            info!(expired_deleted, evicted, "cache cleanup swept");
        }
        Ok(CleanupStats {
            expired_deleted,
            evicted,
        })
    }

    /// Aggregate statistics.
    pub async fn stats(&self) -> Result<CacheStats> {
        let conn = self.pool.acquire().await;
        let (total_entries, total_hits, stored_bytes, oldest_created_at) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0),
                    COALESCE(SUM(file_size), 0), MIN(created_at)
             FROM cache_entries",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;

        let hit_rate = if total_hits > 0 {
            (total_hits - total_entries) as f64 / total_hits as f64 * 100.0
        } else {
            0.0
        };

        Ok(CacheStats {
            total_entries,
            total_hits,
            hit_rate,
            stored_bytes,
            oldest_created_at,
        })
    }
}

/// Fingerprint of a fully rendered prompt. Changes whenever templates or
/// configuration change, invalidating stale cache entries.
pub fn prompt_fingerprint(prompt: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let digest = Sha256::digest(prompt.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
