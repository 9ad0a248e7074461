/// A row of the durable key-value table.
#[derive(Debug, Clone)]
pub struct DurableEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// A row of the expiring cache table. `expires_at` is a unix timestamp in seconds.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: i64,
}
