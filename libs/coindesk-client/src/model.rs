use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Top list of assets as returned by the CoinDesk API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopList {
    #[serde(rename = "Data")]
    pub data: Data,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Data {
    #[serde(rename = "STATS")]
    pub stats: Stats,
    #[serde(rename = "LIST", default)]
    pub assets: Vec<Asset>,
}

/// Pagination and total asset information.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Stats {
    #[serde(rename = "PAGE")]
    pub page: u32,
    #[serde(rename = "PAGE_SIZE")]
    pub page_size: u32,
    #[serde(rename = "TOTAL_ASSETS")]
    pub total_assets: u32,
}

/// An individual asset row in the top list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Asset {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "PRICE_USD")]
    pub price: f64,
    /// Unix seconds of the last price update.
    #[serde(rename = "PRICE_USD_LAST_UPDATE_TS")]
    pub price_last_updated_at: i64,
    #[serde(rename = "SYMBOL")]
    pub symbol: String,
}

/// Error payload shape for 4xx/5xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "Err")]
    pub err: ErrorMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub message: String,
}

/// A resolved asset price, timestamp already in UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPrice {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl From<&Asset> for AssetPrice {
    fn from(asset: &Asset) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            timestamp: DateTime::from_timestamp(asset.price_last_updated_at, 0)
                .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH),
            price: asset.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_top_list_response() {
        let body = r#"{
            "Data": {
                "STATS": {"PAGE": 1, "PAGE_SIZE": 10, "TOTAL_ASSETS": 3145},
                "LIST": [
                    {"ID": 1, "SYMBOL": "BTC", "PRICE_USD": 113907.168087996, "PRICE_USD_LAST_UPDATE_TS": 1754218141},
                    {"ID": 2, "SYMBOL": "ETH", "PRICE_USD": 3483.56905401533, "PRICE_USD_LAST_UPDATE_TS": 1754218141}
                ]
            }
        }"#;

        let top: TopList = serde_json::from_str(body).unwrap();
        assert_eq!(top.data.stats.page, 1);
        assert_eq!(top.data.stats.page_size, 10);
        assert_eq!(top.data.stats.total_assets, 3145);
        assert_eq!(top.data.assets.len(), 2);
        assert_eq!(top.data.assets[0].symbol, "BTC");
        assert_eq!(top.data.assets[0].price, 113907.168087996);
    }

    #[test]
    fn missing_list_defaults_to_empty() {
        let body = r#"{"Data": {"STATS": {"PAGE": 1, "PAGE_SIZE": 10, "TOTAL_ASSETS": 0}}}"#;
        let top: TopList = serde_json::from_str(body).unwrap();
        assert!(top.data.assets.is_empty());
    }

    #[test]
    fn asset_price_converts_unix_seconds_to_utc() {
        let asset = Asset {
            id: 1,
            price: 50000.0,
            price_last_updated_at: 1754218141,
            symbol: "BTC".to_string(),
        };

        let price = AssetPrice::from(&asset);
        assert_eq!(price.symbol, "BTC");
        assert_eq!(price.price, 50000.0);
        assert_eq!(price.timestamp.timestamp(), 1754218141);
        assert_eq!(price.timestamp.to_rfc3339(), "2025-08-03T10:49:01+00:00");
    }
}
