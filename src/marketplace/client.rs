// SP-API product pricing client
//
// One HTTP call per fetch_one; retries and throttling live in crate::fetch.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::{extract_pricing, Marketplace, PricingRecord};
use crate::fetch::{FetchError, ItemFetcher};

const ITEMS_PATH: [&str; 4] = ["products", "pricing", "v0", "items"];
const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

/// `getItemOffers` client. Credentials are an already-issued access token.
#[derive(Debug, Clone)]
pub struct SpApiClient {
    http: reqwest::Client,
    endpoint: Option<Url>,
    access_token: Option<String>,
}

impl SpApiClient {
    /// `endpoint` overrides the marketplace's regional endpoint (sandbox, tests).
    pub fn new(
        endpoint: Option<&str>,
        access_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint
            .map(|raw| {
                Url::parse(raw).with_context(|| format!("Invalid SP-API endpoint: {}", raw))
            })
            .transpose()?;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("fba-pricing/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            access_token,
        })
    }

    fn offers_url(&self, asin: &str, marketplace: Marketplace) -> Result<Url, FetchError> {
        let mut url = match &self.endpoint {
            Some(url) => url.clone(),
            None => Url::parse(marketplace.endpoint())
                .map_err(|e| FetchError::Other(format!("bad regional endpoint: {}", e)))?,
        };

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::Other("endpoint cannot be a base URL".into()))?;
            segments.pop_if_empty();
            segments.extend(ITEMS_PATH);
            segments.push(asin);
            segments.push("offers");
        }

        url.query_pairs_mut()
            .append_pair("MarketplaceId", marketplace.marketplace_id())
            .append_pair("ItemCondition", "New")
            .append_pair("CustomerType", "Consumer");

        Ok(url)
    }
}

#[async_trait]
impl ItemFetcher for SpApiClient {
    type Payload = PricingRecord;

    async fn fetch_one(
        &self,
        identifier: &str,
        marketplace: Marketplace,
    ) -> Result<PricingRecord, FetchError> {
        let url = self.offers_url(identifier, marketplace)?;
        debug!(asin = identifier, url = %url, "Requesting item offers");

        let mut request = self.http.get(url);
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(format!("invalid JSON body: {}", e)))?;
        let payload = body
            .get("payload")
            .ok_or(FetchError::MissingField("payload"))?;

        extract_pricing(identifier, payload)
    }
}

fn classify_status(status: StatusCode, message: String) -> FetchError {
    let status_code = status.as_u16();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Status {
            status: status_code,
            message,
        }
    } else {
        FetchError::Rejected {
            status: status_code,
            message,
        }
    }
}
