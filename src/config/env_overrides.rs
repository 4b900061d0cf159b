use super::{LogFormat, RuntimeConfig, ServerConfig};
use anyhow::{anyhow, Result};

pub const ENV_PREFIX: &str = "FBA_PRICING_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the FBA_PRICING_ prefix
    /// Used for conventional variables such as PORT
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority below CLI flags).
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Rate limiting
    if let Some(val) = get_env_usize(env, "RATE_LIMIT_CALLS")? {
        config.rate_limit.max_calls = val;
    }
    if let Some(val) = get_env_f64(env, "RATE_LIMIT_WINDOW")? {
        config.rate_limit.window_secs = val;
    }

    // Batch processing
    if let Some(val) = get_env_f64(env, "REQUEST_TIMEOUT")? {
        config.batch.request_timeout_secs = val;
    }
    if let Some(val) = get_env_usize(env, "MAX_BATCH_SIZE")? {
        config.batch.max_batch_size = val;
    }
    if let Some(val) = get_env_usize(env, "MAX_WORKERS")? {
        config.batch.max_workers = val;
    }

    // Retries
    if let Some(val) = get_env_u32(env, "MAX_RETRIES")? {
        config.retry.max_retries = val;
    }
    if let Some(val) = get_env_f64(env, "RETRY_DELAY_BASE")? {
        config.retry.delay_base = val;
    }

    // Marketplace API
    if let Some(country) = get_env_string(env, "DEFAULT_COUNTRY") {
        config.marketplace.default_country = country;
    }
    if let Some(endpoint) = get_env_string(env, "SP_API_ENDPOINT") {
        config.marketplace.endpoint = Some(endpoint).filter(|e| !e.is_empty());
    }
    if let Some(token) = get_env_string(env, "SP_API_ACCESS_TOKEN") {
        config.marketplace.access_token = Some(token).filter(|t| !t.is_empty());
    }

    // Server configuration (listen addr, log level/format)
    // PORT is the conventional process-manager variable; LISTEN_ADDR wins if both are set
    if let Some(port) = env.get_raw("PORT") {
        let port = port
            .parse::<u16>()
            .map_err(|e| anyhow!("Failed to parse PORT: {}", e))?;
        ensure_server(config).listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = get_env_string(env, "LISTEN_ADDR") {
        ensure_server(config).listen_addr = addr;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        ensure_server(config).log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        let parsed = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        ensure_server(config).log_format = parsed;
    }

    Ok(())
}

fn ensure_server(config: &mut RuntimeConfig) -> &mut ServerConfig {
    config.server.get_or_insert_with(ServerConfig::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    parse_env(env, key)
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    parse_env(env, key)
}

fn get_env_f64<E: EnvSource>(env: &E, key: &str) -> Result<Option<f64>> {
    parse_env(env, key)
}

fn parse_env<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0
                .get(format!("{}{}", ENV_PREFIX, key).as_str())
                .map(|v| v.to_string())
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn test_overrides_every_numeric_setting() {
        let env = MapEnv(HashMap::from([
            ("FBA_PRICING_RATE_LIMIT_CALLS", "10"),
            ("FBA_PRICING_RATE_LIMIT_WINDOW", "30"),
            ("FBA_PRICING_REQUEST_TIMEOUT", "12.5"),
            ("FBA_PRICING_MAX_BATCH_SIZE", "50"),
            ("FBA_PRICING_MAX_WORKERS", "2"),
            ("FBA_PRICING_MAX_RETRIES", "4"),
            ("FBA_PRICING_RETRY_DELAY_BASE", "3"),
        ]));
        let mut config = RuntimeConfig::defaults();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.rate_limit.max_calls, 10);
        assert_eq!(config.rate_limit.window_secs, 30.0);
        assert_eq!(config.batch.request_timeout_secs, 12.5);
        assert_eq!(config.batch.max_batch_size, 50);
        assert_eq!(config.batch.max_workers, 2);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.delay_base, 3.0);
    }

    #[test]
    fn test_port_and_listen_addr() {
        let env = MapEnv(HashMap::from([("PORT", "8081")]));
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.server.unwrap().listen_addr, "0.0.0.0:8081");

        let env = MapEnv(HashMap::from([
            ("PORT", "8081"),
            ("FBA_PRICING_LISTEN_ADDR", "127.0.0.1:9000"),
            ("FBA_PRICING_LOG_FORMAT", "JSON"),
        ]));
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.listen_addr, "127.0.0.1:9000");
        assert_eq!(server.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparseable_value_names_the_variable() {
        let env = MapEnv(HashMap::from([("FBA_PRICING_MAX_WORKERS", "five")]));
        let mut config = RuntimeConfig::defaults();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("FBA_PRICING_MAX_WORKERS"));
    }

    #[test]
    fn test_empty_token_clears_credentials() {
        let env = MapEnv(HashMap::from([
            ("FBA_PRICING_SP_API_ACCESS_TOKEN", ""),
            ("FBA_PRICING_SP_API_ENDPOINT", "https://sandbox.sellingpartnerapi-na.amazon.com"),
        ]));
        let mut config = RuntimeConfig::defaults();
        config.marketplace.access_token = Some("stale".to_string());
        apply_env_overrides(&mut config, &env).unwrap();
        assert!(config.marketplace.access_token.is_none());
        assert_eq!(
            config.marketplace.endpoint.as_deref(),
            Some("https://sandbox.sellingpartnerapi-na.amazon.com")
        );
    }
}
