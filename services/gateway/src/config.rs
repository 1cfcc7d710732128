use std::env;
use std::time::Duration;

use market_data::store::{InfluxConfig, StdDevMode};

/// Gateway configuration derived from environment variables.
///
/// `INFLUXDB_*` and `CRYPTOWAT_BASE_API_URL` keep the names the original
/// deployment used, so existing env files work unchanged.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,

    // ── Upstream feed ──────────────────────────────────────────────
    pub feed_base_url: String,
    pub ingest_enabled: bool,
    pub ingest_interval: Duration,

    // ── Storage ────────────────────────────────────────────────────
    /// `None` ⇒ in-process memory store.
    pub influx: Option<InfluxConfig>,

    // ── Analytics ──────────────────────────────────────────────────
    pub request_timeout: Duration,
    pub stddev_mode: StdDevMode,
}

const DEFAULT_FEED_URL: &str = "https://api.cryptowat.ch";

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn str(&self, name: &str, default: &str) -> String {
        self.raw(name).unwrap_or_else(|| default.to_string())
    }

    fn u16(&self, name: &str, default: u16) -> u16 {
        self.raw(name).and_then(|s| s.parse().ok()).unwrap_or(default)
    }

    fn u64(&self, name: &str, default: u64) -> u64 {
        self.raw(name).and_then(|s| s.parse().ok()).unwrap_or(default)
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        self.raw(name)
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
            .unwrap_or(default)
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Lookup(lookup);

        let request_timeout = Duration::from_millis(env.u64("REQUEST_TIMEOUT_MS", 10_000).max(1));

        let influx = env.raw("INFLUXDB_ADDRESS").map(|url| InfluxConfig {
            url,
            token: env.str("INFLUXDB_TOKEN", ""),
            org: env.str("INFLUXDB_ORG", ""),
            bucket: env.str("INFLUXDB_BUCKET", "crypto"),
            timeout: request_timeout,
        });

        let stddev_mode = env
            .raw("STDDEV_MODE")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            bind: env.str("GATEWAY_BIND", "0.0.0.0"),
            port: env.u16("GATEWAY_PORT", 8080),
            feed_base_url: env.str("CRYPTOWAT_BASE_API_URL", DEFAULT_FEED_URL),
            ingest_enabled: env.bool("INGEST_ENABLED", true),
            ingest_interval: Duration::from_secs(env.u64("INGEST_INTERVAL_SECS", 60).max(1)),
            influx,
            request_timeout,
            stddev_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.feed_base_url, DEFAULT_FEED_URL);
        assert!(cfg.ingest_enabled);
        assert_eq!(cfg.ingest_interval, Duration::from_secs(60));
        assert!(cfg.influx.is_none());
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.stddev_mode, StdDevMode::Sample);
    }

    #[test]
    fn test_influx_enabled_by_address() {
        let cfg = config(&[
            ("INFLUXDB_ADDRESS", " http://influx:8086 "),
            ("INFLUXDB_TOKEN", "secret"),
            ("INFLUXDB_ORG", "acme"),
            ("REQUEST_TIMEOUT_MS", "2500"),
        ]);
        let influx = cfg.influx.unwrap();
        assert_eq!(influx.url, "http://influx:8086");
        assert_eq!(influx.token, "secret");
        assert_eq!(influx.org, "acme");
        assert_eq!(influx.bucket, "crypto");
        assert_eq!(influx.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = config(&[
            ("GATEWAY_PORT", "not-a-port"),
            ("INGEST_ENABLED", "off"),
            ("INGEST_INTERVAL_SECS", "300"),
            ("STDDEV_MODE", "population"),
            ("INFLUXDB_ADDRESS", "   "),
        ]);
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.ingest_enabled);
        assert_eq!(cfg.ingest_interval, Duration::from_secs(300));
        assert_eq!(cfg.stddev_mode, StdDevMode::Population);
        assert!(cfg.influx.is_none());
    }
}
