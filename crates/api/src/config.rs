//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use event_bus::ConsumerConfig;
use saga::{
    INVENTORY_SERVICE_GROUP, OrchestratorConfig, PRODUCT_SERVICE_GROUP, ReconcilerConfig,
    ResponderConfig,
};
use store::StoreConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; in-memory backends when unset
/// - `STORE_TIMEOUT_SECS` — deadline per store operation (default: `10`)
/// - `BUS_POLL_INTERVAL_MS` — consumer poll interval (default: `100`)
/// - `INVENTORY_DEDUPE` — skip inventory creation for known products (default: `false`)
/// - `SAGA_PENDING_TIMEOUT_SECS` — age before a product without inventory is reported (default: `30`)
/// - `PRODUCT_CONSUMER_GROUP` — group of the compensation listener (default: `"product-service"`)
/// - `INVENTORY_CONSUMER_GROUP` — group of the inventory responder (default: `"inventory-service"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub store_timeout: Duration,
    pub bus_poll_interval: Duration,
    pub inventory_dedupe: bool,
    pub saga_pending_timeout: Duration,
    pub product_consumer_group: String,
    pub inventory_consumer_group: String,
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_or(lookup("LOG_FORMAT"), defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            store_timeout: Duration::from_secs(parse_or(lookup("STORE_TIMEOUT_SECS"), 10)),
            bus_poll_interval: Duration::from_millis(parse_or(lookup("BUS_POLL_INTERVAL_MS"), 100)),
            inventory_dedupe: parse_or(lookup("INVENTORY_DEDUPE"), defaults.inventory_dedupe),
            saga_pending_timeout: Duration::from_secs(parse_or(
                lookup("SAGA_PENDING_TIMEOUT_SECS"),
                30,
            )),
            product_consumer_group: lookup("PRODUCT_CONSUMER_GROUP")
                .unwrap_or(defaults.product_consumer_group),
            inventory_consumer_group: lookup("INVENTORY_CONSUMER_GROUP")
                .unwrap_or(defaults.inventory_consumer_group),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::with_timeout(self.store_timeout)
    }

    fn consumer_config(&self, group: &str) -> ConsumerConfig {
        ConsumerConfig {
            poll_interval: self.bus_poll_interval,
            ..ConsumerConfig::new(group)
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            consumer: self.consumer_config(&self.product_consumer_group),
        }
    }

    pub fn responder_config(&self) -> ResponderConfig {
        ResponderConfig {
            dedupe_by_product: self.inventory_dedupe,
            consumer: self.consumer_config(&self.inventory_consumer_group),
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            pending_timeout: self.saga_pending_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            store_timeout: Duration::from_secs(10),
            bus_poll_interval: Duration::from_millis(100),
            inventory_dedupe: false,
            saga_pending_timeout: Duration::from_secs(30),
            product_consumer_group: PRODUCT_SERVICE_GROUP.to_string(),
            inventory_consumer_group: INVENTORY_SERVICE_GROUP.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert!(!config.inventory_dedupe);
    }

    #[test]
    fn test_empty_lookup_matches_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert_eq!(config.bus_poll_interval, Duration::from_millis(100));
        assert_eq!(config.saga_pending_timeout, Duration::from_secs(30));
        assert_eq!(config.product_consumer_group, "product-service");
        assert_eq!(config.inventory_consumer_group, "inventory-service");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/products"),
            ("STORE_TIMEOUT_SECS", "3"),
            ("INVENTORY_DEDUPE", "true"),
            ("INVENTORY_CONSUMER_GROUP", "inventory-replay"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/products")
        );
        assert_eq!(config.store_config().operation_timeout, Duration::from_secs(3));

        let responder = config.responder_config();
        assert!(responder.dedupe_by_product);
        assert_eq!(responder.consumer.group, "inventory-replay");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[("PORT", "not-a-port"), ("LOG_FORMAT", "xml"), ("DATABASE_URL", "")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
