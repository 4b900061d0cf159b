// Pure mapping from a getItemOffers payload to the fields we serve
//
// No I/O here: the client hands over the decoded `payload` object.

use serde::Serialize;
use serde_json::Value;

use crate::fetch::FetchError;

const PRODUCT_URL_BASE: &str = "https://www.amazon.com/dp/";

/// Pricing summary for one ASIN. Field names match what the frontend reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PricingRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Image URL")]
    pub image_url: String,
    #[serde(rename = "Product URL")]
    pub product_url: String,
    #[serde(rename = "SalesRank")]
    pub sales_rank: u64,
    #[serde(rename = "BuyBox Total")]
    pub buy_box_total: f64,
    #[serde(rename = "Lowest FBA")]
    pub lowest_fba: f64,
    #[serde(rename = "List Price")]
    pub list_price: f64,
    #[serde(rename = "Lowest NonFBA")]
    pub lowest_non_fba: f64,
}

/// Extract the pricing summary from an offers payload.
///
/// Missing price fields are reported as [`FetchError::MissingField`]; a missing
/// sales rank is reported as 0.
pub fn extract_pricing(asin: &str, payload: &Value) -> Result<PricingRecord, FetchError> {
    let summary = payload
        .get("Summary")
        .ok_or(FetchError::MissingField("Summary"))?;

    let list_price = amount(summary.pointer("/ListPrice/Amount"))
        .ok_or(FetchError::MissingField("Summary.ListPrice.Amount"))?;

    let buy_box_total = amount(summary.pointer("/BuyBoxPrices/0/LandedPrice/Amount"))
        .ok_or(FetchError::MissingField("Summary.BuyBoxPrices[0].LandedPrice.Amount"))?;

    let lowest_fba = lowest_landed_price(summary, "Amazon")
        .ok_or(FetchError::MissingField("Summary.LowestPrices[Amazon].LandedPrice.Amount"))?;

    let lowest_non_fba = lowest_landed_price(summary, "Merchant").ok_or(
        FetchError::MissingField("Summary.LowestPrices[Merchant].LandedPrice.Amount"),
    )?;

    let sales_rank = summary
        .pointer("/SalesRankings/0/Rank")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(PricingRecord {
        title: String::new(),
        image_url: String::new(),
        product_url: format!("{}{}", PRODUCT_URL_BASE, asin),
        sales_rank,
        buy_box_total,
        lowest_fba,
        list_price,
        lowest_non_fba,
    })
}

fn amount(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn lowest_landed_price(summary: &Value, channel: &str) -> Option<f64> {
    summary
        .get("LowestPrices")?
        .as_array()?
        .iter()
        .find(|entry| {
            entry
                .get("fulfillmentChannel")
                .and_then(Value::as_str)
                .is_some_and(|c| c.eq_ignore_ascii_case(channel))
        })
        .and_then(|entry| amount(entry.pointer("/LandedPrice/Amount")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offers_payload() -> Value {
        json!({
            "ASIN": "B08N5WRWNW",
            "status": "Success",
            "Summary": {
                "ListPrice": {"CurrencyCode": "USD", "Amount": 49.99},
                "BuyBoxPrices": [{
                    "condition": "new",
                    "LandedPrice": {"CurrencyCode": "USD", "Amount": 44.5}
                }],
                "LowestPrices": [
                    {"condition": "new", "fulfillmentChannel": "Merchant",
                     "LandedPrice": {"CurrencyCode": "USD", "Amount": 41.0}},
                    {"condition": "new", "fulfillmentChannel": "Amazon",
                     "LandedPrice": {"CurrencyCode": "USD", "Amount": 43.25}}
                ],
                "SalesRankings": [{"ProductCategoryId": "electronics", "Rank": 1532}]
            }
        })
    }

    #[test]
    fn test_extracts_all_fields() {
        let record = extract_pricing("B08N5WRWNW", &offers_payload()).unwrap();
        assert_eq!(record.list_price, 49.99);
        assert_eq!(record.buy_box_total, 44.5);
        assert_eq!(record.lowest_fba, 43.25);
        assert_eq!(record.lowest_non_fba, 41.0);
        assert_eq!(record.sales_rank, 1532);
        assert_eq!(record.product_url, "https://www.amazon.com/dp/B08N5WRWNW");
        assert!(record.title.is_empty());
    }

    #[test]
    fn test_missing_sales_rank_defaults_to_zero() {
        let mut payload = offers_payload();
        payload["Summary"]
            .as_object_mut()
            .unwrap()
            .remove("SalesRankings");
        let record = extract_pricing("B08N5WRWNW", &payload).unwrap();
        assert_eq!(record.sales_rank, 0);
    }

    #[test]
    fn test_missing_buy_box_is_an_error() {
        let mut payload = offers_payload();
        payload["Summary"]["BuyBoxPrices"] = json!([]);
        let err = extract_pricing("B08N5WRWNW", &payload).unwrap_err();
        assert!(matches!(err, FetchError::MissingField(path) if path.contains("BuyBoxPrices")));
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_missing_channel_is_an_error() {
        let mut payload = offers_payload();
        payload["Summary"]["LowestPrices"] = json!([
            {"fulfillmentChannel": "Amazon", "LandedPrice": {"Amount": 43.25}}
        ]);
        let err = extract_pricing("B08N5WRWNW", &payload).unwrap_err();
        assert!(matches!(err, FetchError::MissingField(path) if path.contains("Merchant")));
    }

    #[test]
    fn test_serializes_with_frontend_field_names() {
        let record = extract_pricing("B08N5WRWNW", &offers_payload()).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["BuyBox Total"], json!(44.5));
        assert_eq!(value["Lowest NonFBA"], json!(41.0));
        assert_eq!(value["SalesRank"], json!(1532));
    }
}
