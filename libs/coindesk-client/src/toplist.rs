use crate::model::{ErrorBody, TopList};
use crate::{Client, ClientError, Page};

impl Client {
    /// Call the top/list endpoint for one page of assets, sorted by
    /// circulating market cap.
    pub async fn top_list(&self, page: Page) -> Result<TopList, ClientError> {
        let url = format!(
            "{}/asset/v1/top/list?page={}&page_size={}&sort_by=CIRCULATING_MKT_CAP_USD&\
             sort_direction=DESC&groups=ID,BASIC,PRICE&toplist_quote_asset=BTC",
            self.base_url(),
            page.number(),
            page.rows_per_page(),
        );

        let response = self
            .http()
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("X-Api-Key", self.api_key())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if status.is_success() {
            return parse_top_list(&body);
        }

        // 400..=503 responses carry a structured error message.
        if status.as_u16() >= 400 && status.as_u16() <= 503 {
            let parsed: ErrorBody = serde_json::from_slice(&body).map_err(ClientError::Decode)?;
            return Err(ClientError::Upstream(parsed.err.message));
        }

        Err(ClientError::UnexpectedStatus {
            url,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn parse_top_list(body: &[u8]) -> Result<TopList, ClientError> {
    serde_json::from_slice(body).map_err(ClientError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn top_list_sends_expected_request() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/asset/v1/top/list")
                .query_param("page", "1")
                .query_param("page_size", "10")
                .query_param("sort_by", "CIRCULATING_MKT_CAP_USD")
                .query_param("sort_direction", "DESC")
                .query_param("groups", "ID,BASIC,PRICE")
                .query_param("toplist_quote_asset", "BTC")
                .header("accept", "application/json")
                .header("content-type", "application/json")
                .header("x-api-key", "apikey-123");
            then.status(200).json_body(json!({
                "Data": {
                    "STATS": {"PAGE": 1, "PAGE_SIZE": 10, "TOTAL_ASSETS": 2},
                    "LIST": [
                        {"ID": 1, "SYMBOL": "BTC", "PRICE_USD": 1.0, "PRICE_USD_LAST_UPDATE_TS": 1},
                        {"ID": 2, "SYMBOL": "ETH", "PRICE_USD": 2.0, "PRICE_USD_LAST_UPDATE_TS": 1}
                    ]
                }
            }));
        });

        let client = Client::new(server.base_url(), "apikey-123").unwrap();
        let top = client.top_list(Page::new(1, 10).unwrap()).await.unwrap();

        assert_eq!(top.data.assets.len(), 2);
        assert_eq!(top.data.stats.total_assets, 2);
        m.assert();
    }

    #[tokio::test]
    async fn top_list_surfaces_upstream_error_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/asset/v1/top/list");
            then.status(400)
                .json_body(json!({"Err": {"message": "Not found: market parameter."}}));
        });

        let client = Client::new(server.base_url(), "k").unwrap();
        let err = client
            .top_list(Page::new(1, 10).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Upstream(m) if m == "Not found: market parameter."));
    }

    #[tokio::test]
    async fn top_list_rejects_unexpected_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/asset/v1/top/list");
            then.status(504).body("gateway timeout");
        });

        let client = Client::new(server.base_url(), "k").unwrap();
        let err = client
            .top_list(Page::new(1, 10).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::UnexpectedStatus { status: 504, .. }));
    }

    #[tokio::test]
    async fn top_list_transport_error() {
        let client = Client::new("http://127.0.0.1:1", "k").unwrap();
        let err = client
            .top_list(Page::new(1, 10).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport { .. }));
    }
}
