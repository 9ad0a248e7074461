//! Ordered key-value tiers for process state.
//!
//! **Memory** – [`DashMap`] in this process only.
//! **Expiring** – SQLite cache file; entries lapse after a TTL.
//! **Durable** – SQLite table that never expires; the source of truth.
//!
//! [`TieredStore::get`] walks the tiers in order and back-fills faster tiers
//! on a hit further down. [`TieredStore::put`] writes through to every tier
//! and succeeds when at least one tier accepted the value.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::sqlite::Database;
use crate::config::StorageConfig;
use crate::error::Error;

pub trait KeyValueStore {
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error>;
    fn delete(&self, key: &str) -> Result<(), Error>;
    /// Live keys starting with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

// ── Memory tier ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => match entry.value().1 {
                Some(deadline) if Instant::now() >= deadline => true,
                _ => return Ok(Some(entry.value().0.clone())),
            },
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
        // an unrepresentable deadline never expires
        let deadline = ttl.and_then(|t| Instant::now().checked_add(t));
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .filter(|e| e.value().1.map_or(true, |deadline| now < deadline))
            .map(|e| e.key().clone())
            .collect())
    }
}

// ── Expiring SQLite tier ─────────────────────────────────────────

pub struct ExpiringStore {
    db: Database,
    default_ttl: Duration,
}

impl ExpiringStore {
    pub fn open(path: &str, default_ttl: Duration) -> Result<Self, Error> {
        Self::with_database(Database::open(path)?, default_ttl)
    }

    pub fn open_in_memory(default_ttl: Duration) -> Result<Self, Error> {
        Self::with_database(Database::open_in_memory()?, default_ttl)
    }

    fn with_database(db: Database, default_ttl: Duration) -> Result<Self, Error> {
        let evicted = db.evict_expired(now_epoch())?;
        if evicted > 0 {
            debug!("Evicted {} expired cache entries", evicted);
        }
        Ok(Self { db, default_ttl })
    }
}

impl KeyValueStore for ExpiringStore {
    fn name(&self) -> &str {
        "expiring-cache"
    }

    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.db.get_cached(key, now_epoch())?.map(|e| e.value))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now_epoch().saturating_add(ttl_secs);
        self.db.put_cached(key, value, expires_at)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.db.delete_cached(key)?;
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        Ok(self.db.cached_keys(prefix, now_epoch())?)
    }
}

// ── Durable SQLite tier ──────────────────────────────────────────

pub struct DurableStore {
    db: Database,
}

impl DurableStore {
    pub fn open(path: &str) -> Result<Self, Error> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }
}

impl KeyValueStore for DurableStore {
    fn name(&self) -> &str {
        "durable"
    }

    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.db.get_durable(key)?.map(|e| e.value))
    }

    /// Durable entries never expire; `ttl` is ignored.
    fn put(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), Error> {
        self.db.put_durable(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.db.delete_durable(key)?;
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        Ok(self.db.durable_keys(prefix)?)
    }
}

// ── Tier chain ───────────────────────────────────────────────────

pub struct TieredStore {
    tiers: Vec<Box<dyn KeyValueStore>>,
    ttl: Option<Duration>,
}

impl TieredStore {
    /// Tiers in priority order, fastest first. `ttl` is applied on every write.
    pub fn new(tiers: Vec<Box<dyn KeyValueStore>>, ttl: Option<Duration>) -> Self {
        Self { tiers, ttl }
    }

    /// Memory, expiring cache file and durable database from configuration.
    /// An unavailable cache file is skipped; the durable tier is required.
    pub fn from_config(config: &StorageConfig) -> Result<Self, Error> {
        let mut tiers: Vec<Box<dyn KeyValueStore>> = vec![Box::new(MemoryStore::new())];
        match ExpiringStore::open(&config.cache_db_path, config.cache_ttl()) {
            Ok(store) => tiers.push(Box::new(store)),
            Err(e) => warn!(
                "Cache tier '{}' unavailable, continuing without it: {}",
                config.cache_db_path, e
            ),
        }
        tiers.push(Box::new(DurableStore::open(&config.durable_db_path)?));
        Ok(Self::new(tiers, Some(config.cache_ttl())))
    }

    /// All three tiers held in memory.
    pub fn in_memory(ttl: Duration) -> Result<Self, Error> {
        let tiers: Vec<Box<dyn KeyValueStore>> = vec![
            Box::new(MemoryStore::new()),
            Box::new(ExpiringStore::open_in_memory(ttl)?),
            Box::new(DurableStore::open_in_memory()?),
        ];
        Ok(Self::new(tiers, Some(ttl)))
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut last_error = None;
        let mut answered = false;

        for (depth, tier) in self.tiers.iter().enumerate() {
            match tier.get(key) {
                Ok(Some(value)) => {
                    if depth > 0 {
                        debug!("'{}' found in {} tier, back-filling", key, tier.name());
                        self.backfill(&self.tiers[..depth], key, &value);
                    }
                    return Ok(Some(value));
                }
                Ok(None) => answered = true,
                Err(e) => {
                    warn!("{} tier read failed for '{}': {}", tier.name(), key, e);
                    last_error = Some(e);
                }
            }
        }

        match (answered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(None),
        }
    }

    fn backfill(&self, faster: &[Box<dyn KeyValueStore>], key: &str, value: &str) {
        for tier in faster {
            if let Err(e) = tier.put(key, value, self.ttl) {
                warn!("{} tier back-fill failed for '{}': {}", tier.name(), key, e);
                invalidate(tier.as_ref(), key);
            }
        }
    }

    /// Write through to every tier. A tier that rejects the write has its
    /// old value for `key` removed, so reads fall through to a tier holding
    /// the new value.
    pub fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut stored = 0;
        for tier in &self.tiers {
            match tier.put(key, value, self.ttl) {
                Ok(()) => stored += 1,
                Err(e) => {
                    warn!("{} tier write failed for '{}': {}", tier.name(), key, e);
                    invalidate(tier.as_ref(), key);
                }
            }
        }
        if stored == 0 {
            return Err(Error::Storage(format!("no tier accepted '{}'", key)));
        }
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), Error> {
        let mut removed = 0;
        for tier in &self.tiers {
            match tier.delete(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!("{} tier delete failed for '{}': {}", tier.name(), key, e),
            }
        }
        if removed == 0 && !self.tiers.is_empty() {
            return Err(Error::Storage(format!("no tier could delete '{}'", key)));
        }
        Ok(())
    }

    /// Union of live keys across tiers, sorted.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut all = BTreeSet::new();
        for tier in &self.tiers {
            match tier.keys(prefix) {
                Ok(keys) => all.extend(keys),
                Err(e) => warn!("{} tier key listing failed: {}", tier.name(), e),
            }
        }
        Ok(all.into_iter().collect())
    }
}

fn invalidate(tier: &dyn KeyValueStore, key: &str) {
    if let Err(e) = tier.delete(key) {
        error!(
            "{} tier may serve a stale '{}': delete after failed write also failed: {}",
            tier.name(),
            key,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Shares one inner store between the chain and the test body.
    struct Shared<S: KeyValueStore>(Rc<S>);

    impl<S: KeyValueStore> KeyValueStore for Shared<S> {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.0.get(key)
        }
        fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
            self.0.put(key, value, ttl)
        }
        fn delete(&self, key: &str) -> Result<(), Error> {
            self.0.delete(key)
        }
        fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
            self.0.keys(prefix)
        }
    }

    struct Broken;

    impl KeyValueStore for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::Storage("down".to_string()))
        }
        fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), Error> {
            Err(Error::Storage("down".to_string()))
        }
        fn delete(&self, _key: &str) -> Result<(), Error> {
            Err(Error::Storage("down".to_string()))
        }
        fn keys(&self, _prefix: &str) -> Result<Vec<String>, Error> {
            Err(Error::Storage("down".to_string()))
        }
    }

    #[test]
    fn test_memory_store_ttl() {
        let store = MemoryStore::new();
        store.put("a", "1", Some(Duration::ZERO)).unwrap();
        store.put("b", "2", None).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys("").unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_expiring_store_zero_ttl_is_absent() {
        let store = ExpiringStore::open_in_memory(Duration::from_secs(60)).unwrap();
        store.put("k", "v", Some(Duration::ZERO)).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.put("k", "v", None).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_durable_store_keys_by_prefix() {
        let store = DurableStore::open_in_memory().unwrap();
        store.put("state:1", "a", None).unwrap();
        store.put("state:2", "b", None).unwrap();
        store.put("table:1", "c", None).unwrap();
        assert_eq!(store.keys("state:").unwrap(), vec!["state:1", "state:2"]);
        store.delete("state:1").unwrap();
        assert_eq!(store.get("state:1").unwrap(), None);
    }

    #[test]
    fn test_durable_hit_backfills_memory() {
        let memory = Rc::new(MemoryStore::new());
        let durable = Rc::new(DurableStore::open_in_memory().unwrap());
        durable.put("k", "v", None).unwrap();

        let tiers: Vec<Box<dyn KeyValueStore>> = vec![
            Box::new(Shared(memory.clone())),
            Box::new(Shared(durable.clone())),
        ];
        let chain = TieredStore::new(tiers, None);
        assert!(memory.is_empty());
        assert_eq!(chain.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(memory.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_write_survives_broken_tier() {
        let tiers: Vec<Box<dyn KeyValueStore>> =
            vec![Box::new(Broken), Box::new(DurableStore::open_in_memory().unwrap())];
        let chain = TieredStore::new(tiers, None);
        chain.put("k", "v").unwrap();
        assert_eq!(chain.get("k").unwrap().as_deref(), Some("v"));
        chain.delete("k").unwrap();
        assert_eq!(chain.get("k").unwrap(), None);
    }

    /// Accepts a fixed number of writes, then rejects every write.
    struct WriteLimited {
        inner: MemoryStore,
        writes_left: Cell<usize>,
    }

    impl WriteLimited {
        fn new(writes: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                writes_left: Cell::new(writes),
            }
        }
    }

    impl KeyValueStore for WriteLimited {
        fn name(&self) -> &str {
            "write-limited"
        }
        fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key)
        }
        fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
            match self.writes_left.get() {
                0 => Err(Error::Storage("write quota exhausted".to_string())),
                n => {
                    self.writes_left.set(n - 1);
                    self.inner.put(key, value, ttl)
                }
            }
        }
        fn delete(&self, key: &str) -> Result<(), Error> {
            self.inner.delete(key)
        }
        fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
            self.inner.keys(prefix)
        }
    }

    #[test]
    fn test_rejected_write_does_not_leave_stale_value() {
        let limited = Rc::new(WriteLimited::new(1));
        let tiers: Vec<Box<dyn KeyValueStore>> = vec![
            Box::new(Shared(limited.clone())),
            Box::new(DurableStore::open_in_memory().unwrap()),
        ];
        let chain = TieredStore::new(tiers, None);

        chain.put("state:p", "v1").unwrap();
        assert_eq!(limited.get("state:p").unwrap().as_deref(), Some("v1"));

        chain.put("state:p", "v2").unwrap();
        assert_eq!(limited.get("state:p").unwrap(), None);
        assert_eq!(chain.get("state:p").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let memory = MemoryStore::new();
        memory.put("k", "v", Some(Duration::MAX)).unwrap();
        assert_eq!(memory.get("k").unwrap().as_deref(), Some("v"));

        let cache = ExpiringStore::open_in_memory(Duration::from_secs(60)).unwrap();
        cache.put("k", "v", Some(Duration::from_secs(u64::MAX))).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_all_tiers_broken() {
        let tiers: Vec<Box<dyn KeyValueStore>> = vec![Box::new(Broken)];
        let chain = TieredStore::new(tiers, None);
        assert!(chain.put("k", "v").is_err());
        assert!(chain.get("k").is_err());
    }

    #[test]
    fn test_in_memory_chain_order() {
        let chain = TieredStore::in_memory(Duration::from_secs(60)).unwrap();
        assert_eq!(chain.tier_names(), vec!["memory", "expiring-cache", "durable"]);
    }
}
