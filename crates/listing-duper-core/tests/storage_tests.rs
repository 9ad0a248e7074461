use std::time::Duration;
use tempfile::tempdir;

use listing_duper_core::config::StorageConfig;
use listing_duper_core::storage::{
    Database, DurableStore, ExpiringStore, KeyValueStore, MemoryStore, TieredStore,
};

fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_durable_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = path_in(&dir, "durable.db");

    {
        let store = DurableStore::open(&path).unwrap();
        store.put("state:a", "{\"n\":1}", None).unwrap();
        store.put("state:b", "{\"n\":2}", None).unwrap();
        store.put("csv:a", "Item ID,Title", None).unwrap();
    }

    let store = DurableStore::open(&path).unwrap();
    assert_eq!(store.get("state:a").unwrap().as_deref(), Some("{\"n\":1}"));
    assert_eq!(store.keys("state:").unwrap(), vec!["state:a", "state:b"]);

    store.delete("state:a").unwrap();
    assert_eq!(store.get("state:a").unwrap(), None);
}

#[test]
fn test_expiring_store_drops_expired_entries() {
    let dir = tempdir().unwrap();
    let path = path_in(&dir, "cache.db");

    let store = ExpiringStore::open(&path, Duration::from_secs(3600)).unwrap();
    store.put("live", "1", None).unwrap();
    store.put("dead", "2", Some(Duration::ZERO)).unwrap();

    assert_eq!(store.get("live").unwrap().as_deref(), Some("1"));
    assert_eq!(store.get("dead").unwrap(), None);
    assert_eq!(store.keys("").unwrap(), vec!["live"]);
    drop(store);

    // Reopening evicts expired rows from the file.
    let db = Database::open(&path).unwrap();
    let remaining: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM cache_entry", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 2);
    drop(db);
    let _store = ExpiringStore::open(&path, Duration::from_secs(3600)).unwrap();
    let db = Database::open(&path).unwrap();
    let remaining: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM cache_entry", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 1);
}

#[test]
fn test_memory_store_respects_ttl() {
    let store = MemoryStore::new();
    store.put("a", "1", None).unwrap();
    store.put("b", "2", Some(Duration::ZERO)).unwrap();
    assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    assert_eq!(store.get("b").unwrap(), None);
}

#[test]
fn test_tiered_store_falls_back_to_durable_after_restart() {
    let dir = tempdir().unwrap();
    let config = StorageConfig {
        durable_db_path: path_in(&dir, "durable.db"),
        cache_db_path: path_in(&dir, "cache.db"),
        cache_ttl_secs: 3600,
    };

    {
        let store = TieredStore::from_config(&config).unwrap();
        assert_eq!(store.tier_names(), vec!["memory", "expiring-cache", "durable"]);
        store.put("state:p1", "saved").unwrap();
    }

    // Wipe the cache file's contents so only the durable tier has the value.
    {
        let cache = ExpiringStore::open(&config.cache_db_path, Duration::from_secs(3600)).unwrap();
        cache.delete("state:p1").unwrap();
    }

    let store = TieredStore::from_config(&config).unwrap();
    assert_eq!(store.get("state:p1").unwrap().as_deref(), Some("saved"));

    // The read back-filled the cache tier.
    let cache = ExpiringStore::open(&config.cache_db_path, Duration::from_secs(3600)).unwrap();
    assert_eq!(cache.get("state:p1").unwrap().as_deref(), Some("saved"));
}

#[test]
fn test_tiered_store_delete_clears_every_tier() {
    let store = TieredStore::in_memory(Duration::from_secs(60)).unwrap();
    store.put("state:x", "1").unwrap();
    store.put("state:y", "2").unwrap();
    store.put("csv:x", "3").unwrap();
    assert_eq!(store.keys("state:").unwrap(), vec!["state:x", "state:y"]);

    store.delete("state:x").unwrap();
    assert_eq!(store.get("state:x").unwrap(), None);
    assert_eq!(store.keys("state:").unwrap(), vec!["state:y"]);
}
