//! Marketplaces supported by the pricing backend, plus the SP-API client and
//! the pure payload mapper it feeds.

use anyhow::Result;

mod client;
mod pricing;

pub use client::SpApiClient;
pub use pricing::{extract_pricing, PricingRecord};

const NA_ENDPOINT: &str = "https://sellingpartnerapi-na.amazon.com";
const EU_ENDPOINT: &str = "https://sellingpartnerapi-eu.amazon.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marketplace {
    Us,
    Ca,
    Uk,
    In,
}

impl Marketplace {
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Us,
        Marketplace::Ca,
        Marketplace::Uk,
        Marketplace::In,
    ];

    pub fn country_code(&self) -> &'static str {
        match self {
            Marketplace::Us => "US",
            Marketplace::Ca => "CA",
            Marketplace::Uk => "UK",
            Marketplace::In => "IN",
        }
    }

    pub fn marketplace_id(&self) -> &'static str {
        match self {
            Marketplace::Us => "ATVPDKIKX0DER",
            Marketplace::Ca => "A2EUQ1WTGCTBG2",
            Marketplace::Uk => "A1F83G8C2ARO7P",
            Marketplace::In => "A21TJRUUN4KGV",
        }
    }

    /// Regional SP-API endpoint serving this marketplace.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Marketplace::Us | Marketplace::Ca => NA_ENDPOINT,
            Marketplace::Uk | Marketplace::In => EU_ENDPOINT,
        }
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.country_code())
    }
}

impl std::str::FromStr for Marketplace {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "US" => Ok(Marketplace::Us),
            "CA" => Ok(Marketplace::Ca),
            "UK" | "GB" => Ok(Marketplace::Uk),
            "IN" => Ok(Marketplace::In),
            _ => anyhow::bail!("Unsupported marketplace: {}. Supported: US, CA, UK, IN", s),
        }
    }
}
