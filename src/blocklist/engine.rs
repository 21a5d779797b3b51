use super::fetch::Fetch;
use crate::metrics;
use crate::storage::{Storage, KEY_CACHED_BLOCKLIST, KEY_LAST_UPDATE};
use anyhow::{bail, Context, Error};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Persisted blocklist is truncated to this many entries
pub const CACHE_CAP: usize = 150_000;

/// Always-included baseline, unioned into every refresh so the set is
/// never empty even when the remote document shrinks or is malformed
pub const SEED_TRACKERS: &[&str] = &[
    "google-analytics.com",
    "doubleclick.net",
    "hotjar.com",
    "criteo.com",
    "outbrain.com",
    "taboola.com",
    "adservice.google.com",
];

/// Owns the authoritative in-memory domain set and its refresh cycle.
///
/// The set is replaced wholesale on refresh or cache load; readers never
/// observe a partial update.
pub struct BlocklistEngine {
    domains: RwLock<HashSet<String>>,
    fetch: Box<dyn Fetch>,
    store: Arc<dyn Storage>,
    min_rules: usize,
}

impl BlocklistEngine {
    pub fn new(fetch: Box<dyn Fetch>, store: Arc<dyn Storage>, min_rules: usize) -> Self {
        let domains = SEED_TRACKERS.iter().map(|v| v.to_string()).collect();
        Self {
            domains: RwLock::new(domains),
            fetch,
            store,
            min_rules,
        }
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }

    /// Fetch and install a fresh domain set. Any failure leaves the live
    /// set and the persisted cache untouched.
    pub async fn refresh(&self) -> Result<usize, Error> {
        let result = self.refresh_inner().await;
        metrics::refresh(result.is_ok());
        result
    }

    async fn refresh_inner(&self) -> Result<usize, Error> {
        let body = self.fetch.fetch().await?;
        let mut ordered = parse_hosts(&body);

        if ordered.len() < self.min_rules {
            bail!(
                "implausibly small blocklist: {} rules (min {})",
                ordered.len(),
                self.min_rules
            );
        }

        let mut fresh: HashSet<String> = ordered.iter().cloned().collect();
        for seed in SEED_TRACKERS {
            if fresh.insert(seed.to_string()) {
                ordered.push(seed.to_string());
            }
        }

        let size = fresh.len();
        *self.domains.write() = fresh;

        ordered.truncate(CACHE_CAP);
        if let Err(e) = self.persist(&ordered).await {
            warn!("persist blocklist cache failed: {:?}", e);
        }

        Ok(size)
    }

    async fn persist(&self, ordered: &[String]) -> Result<(), Error> {
        self.store
            .set(KEY_CACHED_BLOCKLIST, serde_json::to_string(ordered)?)
            .await?;
        self.store
            .set(KEY_LAST_UPDATE, chrono::Utc::now().timestamp_millis().to_string())
            .await?;
        Ok(())
    }

    /// Startup path: hydrate from the persisted cache, falling back to a
    /// remote refresh when the cache is absent or empty
    pub async fn load_or_refresh(&self) -> Result<usize, Error> {
        match self.load_cache().await {
            Ok(Some(size)) => {
                info!("loaded {} rules from cache", size);
                return Ok(size);
            }
            Ok(None) => debug!("no cached blocklist"),
            Err(e) => warn!("load cached blocklist failed: {:?}", e),
        }
        self.refresh().await
    }

    async fn load_cache(&self) -> Result<Option<usize>, Error> {
        let raw = match self.store.get(KEY_CACHED_BLOCKLIST).await? {
            Some(v) => v,
            None => return Ok(None),
        };

        let cached: Vec<String> =
            serde_json::from_str(&raw).context("corrupt cached blocklist")?;
        if cached.is_empty() {
            return Ok(None);
        }

        let mut set: HashSet<String> = cached.into_iter().collect();
        for seed in SEED_TRACKERS {
            set.insert(seed.to_string());
        }

        let size = set.len();
        *self.domains.write() = set;
        Ok(Some(size))
    }

    /// Two-tier membership test: exact hostname, then the last two labels
    /// (registrable-domain heuristic). The heuristic lets a rule for
    /// `example.com` catch `tracker.sub.example.com`, at the cost of
    /// imprecision for multi-part public suffixes.
    pub fn is_tracked(&self, hostname: &str) -> bool {
        let domain = normalize(hostname);
        if domain.is_empty() {
            return false;
        }

        let domains = self.domains.read();
        if domains.contains(&domain) {
            return true;
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() > 2 {
            let root = labels[labels.len() - 2..].join(".");
            if domains.contains(&root) {
                return true;
            }
        }

        false
    }
}

/// Lowercase, trimmed, no trailing dot
pub fn normalize(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_lowercase()
}

/// Parse a hosts-format document: blank and `#` lines skipped, otherwise
/// the second whitespace-separated field is the hostname. First occurrence
/// wins, so truncation to the cache cap is deterministic.
fn parse_hosts(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = vec![];

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(_), Some(host)) = (fields.next(), fields.next()) else {
            continue;
        };

        let host = normalize(host);
        if !host.is_empty() && seen.insert(host.clone()) {
            ordered.push(host);
        }
    }

    ordered
}
