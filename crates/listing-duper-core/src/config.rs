use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effective configuration, passed explicitly into each component.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub columns: ColumnConfig,
    pub detection: DetectionConfig,
    pub chunking: ChunkingConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
}

/// Header keywords, matched as substrings of lower-cased, whitespace-free headers.
/// Keywords are tried in list order, so more specific ones go first.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub title: Vec<String>,
    pub item_id: Vec<String>,
    pub start_date: Vec<String>,
    pub listing_site: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            title: strings(&["itemtitle", "title", "name"]),
            item_id: strings(&["itemid", "itemnumber", "listingid", "id"]),
            start_date: strings(&["startdate", "start", "listed", "date"]),
            listing_site: strings(&["listingsite", "sitecode", "site"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Only rows listed on this site take part in grouping, when the site column resolves.
    pub site_filter: Option<String>,
    /// Row count at or above which the CLI switches to the chunked controller.
    pub chunked_threshold_rows: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            site_filter: None,
            chunked_threshold_rows: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub detect_chunk_size: usize,
    pub time_budget_secs: u64,
    pub safety_margin_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            detect_chunk_size: 800,
            time_budget_secs: 300,
            safety_margin_secs: 60,
        }
    }
}

impl ChunkingConfig {
    /// Wall-clock time after which an invocation must pause.
    pub fn pause_after(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs.saturating_sub(self.safety_margin_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub durable_db_path: String,
    pub cache_db_path: String,
    pub cache_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable_db_path: "listing_duper.db".to_string(),
            cache_db_path: "listing_duper_cache.db".to_string(),
            cache_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl StorageConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub action: String,
    pub end_code: String,
    pub action_header: String,
    pub item_id_header: String,
    pub end_code_header: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            action: "End".to_string(),
            end_code: "OtherListingError".to_string(),
            action_header: "Action".to_string(),
            item_id_header: "ItemID".to_string(),
            end_code_header: "EndCode".to_string(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Load `Config.toml` (optional) overlaid with `LISTING_DUPER__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("LISTING_DUPER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.detect_chunk_size, 800);
        assert_eq!(config.detection.chunked_threshold_rows, 15_000);
        assert_eq!(config.export.end_code, "OtherListingError");
        assert_eq!(config.storage.cache_ttl(), Duration::from_secs(21_600));
    }

    #[test]
    fn test_pause_after_saturates() {
        let chunking = ChunkingConfig {
            detect_chunk_size: 800,
            time_budget_secs: 10,
            safety_margin_secs: 60,
        };
        assert_eq!(chunking.pause_after(), Duration::ZERO);
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config = Config::builder()
            .set_override("chunking.detect_chunk_size", 500)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();
        assert_eq!(config.chunking.detect_chunk_size, 500);
        assert_eq!(config.chunking.time_budget_secs, 300);
        assert_eq!(config.columns.title[0], "itemtitle");
    }
}
