//! Bridge configuration from environment variables (with `.env` support
//! via dotenvy in main). Problems are reported with `eprintln!` because
//! the config is read before the tracing subscriber exists.

use std::env;
use tracing::Level;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic filter the bridge subscribes to for incoming metrics.
    pub subscribe_topic: String,
    /// Measurement unique ids that get a derived `_dt` rate field.
    pub calc_ids: Vec<String>,
    /// Regex allow-list deciding which discovery topics are enabled.
    pub listen_topics: Vec<String>,
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.1.5".to_string(),
            broker_port: 1883,
            username: None,
            password: None,
            subscribe_topic: "telegraf/#".to_string(),
            calc_ids: Vec::new(),
            listen_topics: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let broker_port = match env::var("TELEGRAF2HA_BROKER_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                eprintln!("[telegraf2ha] invalid TELEGRAF2HA_BROKER_PORT {raw}: {e}");
                defaults.broker_port
            }),
            Err(_) => defaults.broker_port,
        };

        Self {
            broker_host: env::var("TELEGRAF2HA_BROKER_HOST").unwrap_or(defaults.broker_host),
            broker_port,
            username: env::var("TELEGRAF2HA_USERNAME").ok(),
            password: env::var("TELEGRAF2HA_PASSWORD").ok(),
            subscribe_topic: env::var("TELEGRAF2HA_TOPIC").unwrap_or(defaults.subscribe_topic),
            calc_ids: split_list(&env::var("TELEGRAF2HA_CALC").unwrap_or_default()),
            listen_topics: split_list(&env::var("TELEGRAF2HA_LISTEN_TOPICS").unwrap_or_default()),
            log_level: env::var("TELEGRAF2HA_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Maps the configured level name onto a tracing level. Unknown names
    /// fall back to info; `fatal` has no tracing equivalent and maps to
    /// error.
    pub fn tracing_level(&self) -> Level {
        match self.log_level.as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warning" | "warn" => Level::WARN,
            "error" | "fatal" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Comma-separated list; whitespace is trimmed and empty segments are
/// skipped, so an unset variable yields an empty list rather than one
/// empty entry.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.subscribe_topic, "telegraf/#");
        assert!(config.calc_ids.is_empty());
        assert!(config.listen_topics.is_empty());
    }

    #[test]
    fn split_list_skips_empty_segments() {
        assert!(split_list("").is_empty());
        assert!(split_list(",,").is_empty());
        assert_eq!(split_list("a,b"), vec!["a", "b"]);
        assert_eq!(split_list(" a , ,b,"), vec!["a", "b"]);
    }

    #[test]
    fn level_names_map_to_tracing_levels() {
        let mut config = BridgeConfig::default();
        assert_eq!(config.tracing_level(), Level::INFO);

        for (name, level) in [
            ("trace", Level::TRACE),
            ("debug", Level::DEBUG),
            ("warning", Level::WARN),
            ("error", Level::ERROR),
            ("fatal", Level::ERROR),
            ("unknown", Level::INFO),
        ] {
            config.log_level = name.to_string();
            assert_eq!(config.tracing_level(), level);
        }
    }
}
