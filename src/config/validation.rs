// Configuration validation
//
// Rejects non-positive settings up front and warns about combinations that
// work but will behave poorly.

use super::*;
use anyhow::{bail, Result};
use std::time::Duration;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_rate_limit_config(&config.rate_limit)?;
    validate_batch_config(&config.batch)?;
    validate_retry_config(&config.retry)?;
    validate_marketplace_config(&config.marketplace)?;

    if let Some(ref server) = config.server {
        validate_server_config(server)?;
    }

    warn_on_tight_budgets(config);

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<()> {
    if config.max_calls == 0 {
        bail!(
            "rate_limit.max_calls must be greater than 0\n\n\
            How to fix:\n\
              • Environment: export {}RATE_LIMIT_CALLS=20\n\
              • TOML: [rate_limit]\n              max_calls = 20\n",
            ENV_PREFIX
        );
    }

    validate_seconds("rate_limit.window_secs", config.window_secs)?;
    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<()> {
    if config.max_batch_size == 0 {
        bail!("batch.max_batch_size must be greater than 0");
    }

    if config.max_workers == 0 {
        bail!("batch.max_workers must be greater than 0");
    }

    validate_seconds("batch.request_timeout_secs", config.request_timeout_secs)?;

    if config.max_batch_size > 10_000 {
        warn!(
            max_batch_size = config.max_batch_size,
            "batch.max_batch_size is very large; a single batch may hold the rate limit for a long time"
        );
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<()> {
    if config.max_retries == 0 {
        bail!("retry.max_retries must be greater than 0 (it counts the first attempt)");
    }

    if !config.delay_base.is_finite() || config.delay_base <= 0.0 {
        bail!(
            "retry.delay_base must be a positive number, got {}",
            config.delay_base
        );
    }

    Ok(())
}

fn validate_marketplace_config(config: &MarketplaceConfig) -> Result<()> {
    config.default_marketplace()?;

    if let Some(endpoint) = &config.endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!(
                "marketplace.endpoint must be an http(s) URL, got '{}'",
                endpoint
            );
        }
    }

    if config.access_token.is_none() {
        warn!(
            "No SP-API access token configured; set {}SP_API_ACCESS_TOKEN or marketplace.access_token",
            ENV_PREFIX
        );
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

fn validate_seconds(name: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("{} must be a positive number of seconds, got {}", name, secs);
    }
    if Duration::try_from_secs_f64(secs).is_err() {
        bail!("{} is too large: {}", name, secs);
    }
    Ok(())
}

fn warn_on_tight_budgets(config: &RuntimeConfig) {
    let policy = config.retry.policy();
    let backoff = policy.total_backoff();
    let timeout = config.batch.request_timeout();
    if backoff >= timeout {
        warn!(
            backoff_secs = backoff.as_secs_f64(),
            timeout_secs = timeout.as_secs_f64(),
            "Per-item timeout cannot cover the full retry backoff; late retries will time out"
        );
    }

    if config.batch.max_workers > config.rate_limit.max_calls {
        warn!(
            max_workers = config.batch.max_workers,
            max_calls = config.rate_limit.max_calls,
            "More workers than calls per window; extra workers will wait on the rate limiter"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rate_limit_config() {
        let valid = RateLimitConfig {
            max_calls: 20,
            window_secs: 60.0,
        };
        assert!(validate_rate_limit_config(&valid).is_ok());

        let no_calls = RateLimitConfig {
            max_calls: 0,
            window_secs: 60.0,
        };
        let err = validate_rate_limit_config(&no_calls).unwrap_err();
        assert!(err.to_string().contains("FBA_PRICING_RATE_LIMIT_CALLS"));

        for window_secs in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e30] {
            let invalid = RateLimitConfig {
                max_calls: 20,
                window_secs,
            };
            assert!(validate_rate_limit_config(&invalid).is_err(), "{}", window_secs);
        }
    }

    #[test]
    fn test_validate_batch_config() {
        assert!(validate_batch_config(&BatchConfig::default()).is_ok());

        let no_workers = BatchConfig {
            max_workers: 0,
            ..BatchConfig::default()
        };
        assert!(validate_batch_config(&no_workers).is_err());

        let no_batch = BatchConfig {
            max_batch_size: 0,
            ..BatchConfig::default()
        };
        assert!(validate_batch_config(&no_batch).is_err());

        let no_timeout = BatchConfig {
            request_timeout_secs: 0.0,
            ..BatchConfig::default()
        };
        assert!(validate_batch_config(&no_timeout).is_err());
    }

    #[test]
    fn test_validate_retry_config() {
        assert!(validate_retry_config(&RetryConfig::default()).is_ok());
        assert!(validate_retry_config(&RetryConfig {
            max_retries: 0,
            delay_base: 2.0
        })
        .is_err());
        assert!(validate_retry_config(&RetryConfig {
            max_retries: 3,
            delay_base: -2.0
        })
        .is_err());
    }

    #[test]
    fn test_validate_marketplace_config() {
        assert!(validate_marketplace_config(&MarketplaceConfig::default()).is_ok());

        let unknown = MarketplaceConfig {
            default_country: "ZZ".to_string(),
            ..MarketplaceConfig::default()
        };
        assert!(validate_marketplace_config(&unknown).is_err());

        let bad_endpoint = MarketplaceConfig {
            endpoint: Some("sellingpartnerapi-na.amazon.com".to_string()),
            ..MarketplaceConfig::default()
        };
        assert!(validate_marketplace_config(&bad_endpoint).is_err());
    }

    #[test]
    fn test_validate_server_config() {
        assert!(validate_server_config(&ServerConfig::default()).is_ok());
        let invalid = ServerConfig {
            listen_addr: "localhost".to_string(),
            ..ServerConfig::default()
        };
        assert!(validate_server_config(&invalid).is_err());
    }
}
