// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use loginq_app::Clock;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

pub const APP_NAME: &str = "loginq";
pub const CACHE_PATH_ENV: &str = "LOGINQ_CACHE_PATH";

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheRegion {
    LeadList,
    Users,
    LoanTypes,
    StatusTaxonomy,
}

impl CacheRegion {
    pub const ALL: [Self; 4] = [
        Self::LeadList,
        Self::Users,
        Self::LoanTypes,
        Self::StatusTaxonomy,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeadList => "lead_list",
            Self::Users => "users",
            Self::LoanTypes => "loan_types",
            Self::StatusTaxonomy => "status_taxonomy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|region| region.as_str() == value)
    }

    pub fn default_policy(self) -> FreshnessPolicy {
        let (show, skip) = match self {
            Self::LeadList => (300, 30),
            Self::Users | Self::LoanTypes => (900, 600),
            Self::StatusTaxonomy => (600, 300),
        };
        FreshnessPolicy {
            show: Duration::from_secs(show),
            skip: Duration::from_secs(skip),
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::LeadList => 0,
            Self::Users => 1,
            Self::LoanTypes => 2,
            Self::StatusTaxonomy => 3,
        }
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long an entry may be shown (`show`) and how long it is trusted
/// without revalidation (`skip`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    show: Duration,
    skip: Duration,
}

impl FreshnessPolicy {
    pub fn new(show: Duration, skip: Duration) -> Result<Self> {
        if show.is_zero() {
            bail!("cache show threshold must be positive");
        }
        if skip >= show {
            bail!(
                "cache skip threshold ({}s) must be shorter than the show threshold ({}s)",
                skip.as_secs_f64(),
                show.as_secs_f64()
            );
        }
        Ok(Self { show, skip })
    }

    pub const fn show(&self) -> Duration {
        self.show
    }

    pub const fn skip(&self) -> Duration {
        self.skip
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `"{subject}/{sha256}"` over the dimension pairs sorted by name, so the
    /// same parameters always land on the same key regardless of order.
    /// Names and values are length-prefixed, so no value can mimic a
    /// different set of pairs.
    pub fn for_subject(subject: &str, dims: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<&(&str, &str)> = dims.iter().collect();
        sorted.sort();
        let canonical: String = sorted
            .iter()
            .map(|(name, value)| format!("{}:{name}{}:{value}", name.len(), value.len()))
            .collect();
        Self(format!("{subject}/{}", checksum_sha256(canonical.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub data: T,
    pub is_stale: bool,
    pub age: Duration,
}

/// What a caller should do after looking in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Fresh enough; no network traffic.
    ServeCached,
    /// Show the cached copy now and refetch in the background.
    ServeAndRevalidate,
    /// Nothing showable; fetch and wait.
    FetchNow,
}

impl FetchPlan {
    pub fn for_hit<T>(hit: Option<&CacheHit<T>>) -> Self {
        match hit {
            Some(hit) if !hit.is_stale => Self::ServeCached,
            Some(_) => Self::ServeAndRevalidate,
            None => Self::FetchNow,
        }
    }

    pub const fn needs_fetch(self) -> bool {
        !matches!(self, Self::ServeCached)
    }
}

pub struct CacheStore {
    conn: Connection,
    clock: Arc<dyn Clock>,
    policies: [FreshnessPolicy; 4],
}

impl CacheStore {
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open cache database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self::with_connection(conn, clock))
    }

    pub fn open_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory cache database")?;
        configure_connection(&conn)?;
        Ok(Self::with_connection(conn, clock))
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn,
            clock,
            policies: CacheRegion::ALL.map(CacheRegion::default_policy),
        }
    }

    pub fn bootstrap(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .context("read cache schema version")?;
        if version > SCHEMA_VERSION {
            bail!(
                "cache database schema version {version} is newer than this build supports ({SCHEMA_VERSION}); delete the cache file or upgrade loginq"
            );
        }
        self.conn
            .execute_batch(include_str!("sql/schema.sql"))
            .context("create cache schema")
    }

    pub fn policy(&self, region: CacheRegion) -> FreshnessPolicy {
        self.policies[region.index()]
    }

    pub fn set_policy(&mut self, region: CacheRegion, policy: FreshnessPolicy) {
        self.policies[region.index()] = policy;
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        region: CacheRegion,
        key: &CacheKey,
    ) -> Result<Option<CacheHit<T>>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT payload, fetched_at_ms FROM cache_entries WHERE region = ?1 AND cache_key = ?2",
                params![region.as_str(), key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("read cache entry {region}/{key}"))?;
        let Some((payload, fetched_at_ms)) = row else {
            return Ok(None);
        };

        let policy = self.policy(region);
        let age = self.age_since(fetched_at_ms);
        if age >= policy.show {
            tracing::debug!(%region, %key, age_secs = age.as_secs(), "cache entry past show threshold");
            return Ok(None);
        }

        let data = match serde_json::from_str::<T>(&payload) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(%region, %key, %error, "discarding malformed cache payload");
                return Ok(None);
            }
        };
        Ok(Some(CacheHit {
            data,
            is_stale: age >= policy.skip,
            age,
        }))
    }

    pub fn put<T: Serialize + ?Sized>(
        &self,
        region: CacheRegion,
        key: &CacheKey,
        data: &T,
    ) -> Result<()> {
        let payload = serde_json::to_string(data)
            .with_context(|| format!("encode cache payload for {region}/{key}"))?;
        self.conn
            .execute(
                "
                INSERT INTO cache_entries (region, cache_key, payload, fetched_at_ms)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (region, cache_key)
                DO UPDATE SET payload = excluded.payload, fetched_at_ms = excluded.fetched_at_ms
                ",
                params![region.as_str(), key.as_str(), payload, unix_ms(self.clock.now())],
            )
            .with_context(|| format!("write cache entry {region}/{key}"))?;
        tracing::debug!(%region, %key, bytes = payload.len(), "cache entry stored");
        Ok(())
    }

    /// Rewrites the payload of an existing entry after a local edit. The
    /// entry keeps its `fetched_at_ms`, so it ages as if untouched. Returns
    /// false when there is no entry to update.
    pub fn replace_payload<T: Serialize + ?Sized>(
        &self,
        region: CacheRegion,
        key: &CacheKey,
        data: &T,
    ) -> Result<bool> {
        let payload = serde_json::to_string(data)
            .with_context(|| format!("encode cache payload for {region}/{key}"))?;
        let updated = self
            .conn
            .execute(
                "UPDATE cache_entries SET payload = ?3 WHERE region = ?1 AND cache_key = ?2",
                params![region.as_str(), key.as_str(), payload],
            )
            .with_context(|| format!("update cache entry {region}/{key}"))?;
        Ok(updated > 0)
    }

    pub fn invalidate(&self, region: CacheRegion, key: &CacheKey) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM cache_entries WHERE region = ?1 AND cache_key = ?2",
                params![region.as_str(), key.as_str()],
            )
            .with_context(|| format!("invalidate cache entry {region}/{key}"))?;
        Ok(removed > 0)
    }

    pub fn invalidate_region(&self, region: CacheRegion) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM cache_entries WHERE region = ?1",
                params![region.as_str()],
            )
            .with_context(|| format!("invalidate cache region {region}"))
    }

    /// Drops every entry that can no longer be shown.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = unix_ms(self.clock.now());
        let mut removed = 0;
        for region in CacheRegion::ALL {
            let show_ms = i64::try_from(self.policy(region).show.as_millis())
                .map_err(|_| anyhow!("show threshold for {region} is too large"))?;
            removed += self
                .conn
                .execute(
                    "DELETE FROM cache_entries WHERE region = ?1 AND fetched_at_ms <= ?2",
                    params![region.as_str(), now.saturating_sub(show_ms)],
                )
                .with_context(|| format!("purge expired entries in {region}"))?;
        }
        if removed > 0 {
            tracing::info!(removed, "purged expired cache entries");
        }
        Ok(removed)
    }

    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .context("count cache entries")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn age_since(&self, fetched_at_ms: i64) -> Duration {
        let elapsed = unix_ms(self.clock.now()).saturating_sub(fetched_at_ms);
        // An entry from the future (clock moved backwards) counts as brand new.
        Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
    }
}

pub fn default_cache_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(CACHE_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let cache_root = dirs::cache_dir().ok_or_else(|| {
        anyhow!("cannot resolve cache directory; set {CACHE_PATH_ENV} to a writable cache path")
    })?;

    let app_dir = cache_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create cache directory {}", app_dir.display()))?;
    Ok(app_dir.join("cache.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("cache path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "cache path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("cache path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!("cache path {path:?} contains '?'; remove query parameters and use a plain file path");
    }

    Ok(())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn unix_ms(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
