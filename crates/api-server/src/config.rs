use analysis_orchestrator::OrchestratorConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_SEC_USER_AGENT: &str = "ticker-analyzer/0.1 contact@example.com";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Identifies this service to SEC EDGAR
    pub sec_user_agent: String,
    pub market_data_api_key: String,
    /// Remote summarizer; the offline template is used when unset
    pub llm_endpoint: Option<String>,
    pub cache_ttl: Duration,
    pub upstream_timeout: Duration,
    /// Periodic purge of expired cache entries; `None` leaves eviction to lookups
    pub cache_sweep_interval: Option<Duration>,
    pub coalesce_in_flight: bool,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let coalesce_in_flight = match var("COALESCE_IN_FLIGHT") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("COALESCE_IN_FLIGHT must be true or false, got '{}'", raw))?,
            None => true,
        };

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("BIND_ADDR is not a socket address: '{}'", bind_raw))?;

        let sweep_secs = secs("CACHE_SWEEP_INTERVAL_SECS", 0)?;

        Ok(Self {
            sec_user_agent: var("SEC_USER_AGENT").unwrap_or_else(|| DEFAULT_SEC_USER_AGENT.to_string()),
            market_data_api_key: var("MARKET_DATA_API_KEY").context("MARKET_DATA_API_KEY not set")?,
            llm_endpoint: var("LLM_ENDPOINT"),
            cache_ttl: Duration::from_secs(secs("CACHE_TTL_SECONDS", 900)?),
            upstream_timeout: Duration::from_secs(secs("UPSTREAM_TIMEOUT_SECS", 30)?),
            cache_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            coalesce_in_flight,
            bind_addr,
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cache_ttl: self.cache_ttl,
            upstream_timeout: self.upstream_timeout,
            coalesce_in_flight: self.coalesce_in_flight,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("MARKET_DATA_API_KEY", "key")]).unwrap();

        assert_eq!(config.sec_user_agent, DEFAULT_SEC_USER_AGENT);
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_sweep_interval, None);
        assert!(config.coalesce_in_flight);
        assert!(config.llm_endpoint.is_none());
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MARKET_DATA_API_KEY", "key"),
            ("LLM_ENDPOINT", "http://localhost:9000/summarize"),
            ("CACHE_TTL_SECONDS", "60"),
            ("CACHE_SWEEP_INTERVAL_SECS", "120"),
            ("COALESCE_IN_FLIGHT", "false"),
            ("BIND_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();

        assert_eq!(config.llm_endpoint.as_deref(), Some("http://localhost:9000/summarize"));
        assert_eq!(config.orchestrator_config().cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_sweep_interval, Some(Duration::from_secs(120)));
        assert!(!config.orchestrator_config().coalesce_in_flight);
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("MARKET_DATA_API_KEY"));
    }

    #[test]
    fn test_invalid_ttl_fails() {
        let err = config(&[("MARKET_DATA_API_KEY", "key"), ("CACHE_TTL_SECONDS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("CACHE_TTL_SECONDS"));
    }

    #[test]
    fn test_blank_endpoint_is_unset() {
        let config = config(&[("MARKET_DATA_API_KEY", "key"), ("LLM_ENDPOINT", "  ")]).unwrap();
        assert!(config.llm_endpoint.is_none());
    }
}
