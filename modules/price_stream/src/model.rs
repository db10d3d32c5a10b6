use chrono::{DateTime, Utc};
use coindesk_client::AssetPrice;
use serde::{Deserialize, Serialize};

/// Anything the replay buffer can hold: carries the instant it was produced.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// One price observation; also the SSE wire payload. Timestamps serialize as
/// RFC 3339 UTC. Deduplication compares the `price` field only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl Timestamped for PriceUpdate {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl From<AssetPrice> for PriceUpdate {
    fn from(price: AssetPrice) -> Self {
        Self {
            symbol: price.symbol,
            timestamp: price.timestamp,
            price: price.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_rfc3339_utc() {
        let update = PriceUpdate {
            symbol: "BTC".to_string(),
            timestamp: DateTime::from_timestamp(1754218141, 0).unwrap(),
            price: 50000.5,
        };

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["symbol"], "BTC");
        assert_eq!(json["price"], 50000.5);

        let raw = json["timestamp"].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(raw).unwrap();
        assert_eq!(parsed.timestamp(), 1754218141);
    }

    #[test]
    fn converts_from_asset_price() {
        let source = AssetPrice {
            symbol: "BTC".to_string(),
            timestamp: DateTime::from_timestamp(100, 0).unwrap(),
            price: 42.0,
        };

        let update = PriceUpdate::from(source);
        assert_eq!(update.symbol, "BTC");
        assert_eq!(update.price, 42.0);
        assert_eq!(update.timestamp().timestamp(), 100);
    }
}
