//! Preview cache CRUD operations.
//!
//! Timestamps are stored as RFC 3339 strings with second precision and a `Z`
//! suffix, so they order correctly as plain text in SQL comparisons.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::is_valid_key;
use crate::{Error, LinkPreview};

/// A cached preview together with the fetch metadata it was resolved from.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedPreview {
    pub hash: String,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub status_code: Option<i32>,
    pub fetched_at: String,
    pub expires_at: Option<String>,
    pub fetch_ms: Option<i64>,
    pub preview: LinkPreview,
}

/// Format a timestamp the way the cache stores it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `fetched_at` and `expires_at` values for an entry fetched at `now`.
pub fn timestamps(now: &DateTime<Utc>, ttl: Option<Duration>) -> (String, Option<String>) {
    let expires_at = ttl
        .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .map(|ttl| format_timestamp(&(*now + ttl)));
    (format_timestamp(now), expires_at)
}

impl CacheDb {
    /// Insert or replace the cached preview for `entry.hash`.
    pub async fn upsert_preview(&self, entry: &CachedPreview) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let preview = &entry.preview;
                conn.execute(
                    "INSERT INTO previews (
                    hash, url, final_url, root_address, title, description, image_url,
                    content_type, status_code, fetched_at, expires_at, fetch_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(hash) DO UPDATE SET
                    url = excluded.url,
                    final_url = excluded.final_url,
                    root_address = excluded.root_address,
                    title = excluded.title,
                    description = excluded.description,
                    image_url = excluded.image_url,
                    content_type = excluded.content_type,
                    status_code = excluded.status_code,
                    fetched_at = excluded.fetched_at,
                    expires_at = excluded.expires_at,
                    fetch_ms = excluded.fetch_ms",
                    params![
                        &entry.hash,
                        &entry.url,
                        &entry.final_url,
                        preview.root_address(),
                        preview.title(),
                        preview.description(),
                        preview.image_url(),
                        &entry.content_type,
                        &entry.status_code,
                        &entry.fetched_at,
                        &entry.expires_at,
                        &entry.fetch_ms,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a cached preview by hash, fresh or not.
    ///
    /// Returns `Error::InvalidHash` for keys that could never have been produced
    /// by `compute_cache_key`.
    pub async fn get_preview(&self, hash: &str) -> Result<Option<CachedPreview>, Error> {
        self.select_preview(hash, false).await
    }

    /// Get a cached preview by hash only if it has not expired yet.
    pub async fn get_fresh_preview(&self, hash: &str) -> Result<Option<CachedPreview>, Error> {
        self.select_preview(hash, true).await
    }

    async fn select_preview(&self, hash: &str, fresh_only: bool) -> Result<Option<CachedPreview>, Error> {
        if !is_valid_key(hash) {
            return Err(Error::InvalidHash);
        }

        let hash = hash.to_string();
        let now = format_timestamp(&Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<CachedPreview>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT
                    hash, url, final_url, root_address, title, description, image_url,
                    content_type, status_code, fetched_at, expires_at, fetch_ms
                FROM previews
                WHERE hash = ?1
                AND (?2 = 0 OR expires_at IS NULL OR expires_at > ?3)",
                )?;

                let result = stmt.query_row(params![hash, fresh_only, now], |row| {
                    let preview = LinkPreview::new(row.get(4)?, row.get(5)?, row.get(6)?, row.get::<_, String>(3)?);
                    Ok(CachedPreview {
                        hash: row.get(0)?,
                        url: row.get(1)?,
                        final_url: row.get(2)?,
                        content_type: row.get(7)?,
                        status_code: row.get(8)?,
                        fetched_at: row.get(9)?,
                        expires_at: row.get(10)?,
                        fetch_ms: row.get(11)?,
                        preview,
                    })
                });

                match result {
                    Ok(p) => Ok(Some(p)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired previews.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_previews(&self) -> Result<u64, Error> {
        let now = format_timestamp(&Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM previews WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete previews whose root address is `domain` or one of its subdomains.
    ///
    /// The host is compared on its own, so roots carrying a port or userinfo
    /// (`example.com:8080`, `user@example.com`) match too.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_previews_by_domain(&self, domain: &str) -> Result<u64, Error> {
        let domain = domain.trim().trim_start_matches('.').trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return Ok(0);
        }

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.unchecked_transaction()?;
                let mut hashes = Vec::new();
                {
                    let mut stmt = tx.prepare("SELECT hash, root_address FROM previews")?;
                    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
                    for row in rows {
                        let (hash, root) = row?;
                        if root_in_domain(&root, &domain) {
                            hashes.push(hash);
                        }
                    }
                }

                let mut deleted = 0;
                {
                    let mut stmt = tx.prepare("DELETE FROM previews WHERE hash = ?1")?;
                    for hash in &hashes {
                        deleted += stmt.execute(params![hash])? as u64;
                    }
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru_previews(&self, max_entries: usize) -> Result<u64, Error> {
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM previews", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM previews WHERE hash IN (
                    SELECT hash FROM previews ORDER BY fetched_at ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

/// Host part of a root address: userinfo, port, query and fragment removed.
fn root_host(root: &str) -> &str {
    let authority = root.split(['?', '#']).next().unwrap_or(root);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    match host.strip_prefix('[') {
        Some(v6) => v6.split_once(']').map_or(v6, |(addr, _)| addr),
        None => host.split_once(':').map_or(host, |(name, _)| name),
    }
}

/// `domain` must already be trimmed and lowercased.
fn root_in_domain(root: &str, domain: &str) -> bool {
    let host = root_host(root).trim_end_matches('.').to_ascii_lowercase();
    host == domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
}
