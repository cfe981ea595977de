//! Alpaca REST API client.

use super::traits::{Broker, MarketData};
use super::types::{Bar, BarSet, BrokerError, Order, OrderId, Position, Timestep};
use crate::config::AlpacaConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";
const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

/// Maximum bars per multi-symbol data request.
const MAX_BARS_LIMIT: usize = 10_000;

/// Alpaca client for both the trading and the market-data API.
pub struct AlpacaClient {
    http: Client,
    api_key: String,
    secret_key: String,
    trading_base_url: String,
    data_base_url: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(with = "rust_decimal::serde::str")]
    cash: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    portfolio_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    is_open: bool,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    qty: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: HashMap<String, Vec<Bar>>,
    next_page_token: Option<String>,
}

/// Earliest timestamp a bar request must cover. Without an explicit `start`
/// Alpaca defaults to the beginning of the current day, which can never fill
/// a multi-bar daily window. Calendar days outnumber trading days, so the
/// daily window is padded for weekends and holidays.
fn window_start(lookback: usize, timestep: Timestep, now: DateTime<Utc>) -> DateTime<Utc> {
    let bars = (lookback + 2) as i64;
    match timestep {
        Timestep::Day => now - Duration::days(bars * 2 + 5),
        Timestep::Minute => now - Duration::minutes(bars * 2 + 30),
    }
}

impl AlpacaClient {
    /// Create a new Alpaca client from configuration.
    pub fn new(config: &AlpacaConfig) -> Result<Self> {
        let trading_base_url = if config.paper {
            PAPER_TRADING_URL.to_string()
        } else {
            LIVE_TRADING_URL.to_string()
        };

        Self::with_base_urls(config, trading_base_url, DATA_URL.to_string())
    }

    /// Create a client against explicit base URLs (used by tests).
    pub fn with_base_urls(
        config: &AlpacaConfig,
        trading_base_url: String,
        data_base_url: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            trading_base_url,
            data_base_url,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    /// Turn non-2xx responses into `BrokerError::Api`.
    async fn check(response: Response) -> Result<Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BrokerError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MarketData for AlpacaClient {
    #[instrument(skip(self, symbols), fields(symbol_count = symbols.len()))]
    async fn get_bars(
        &self,
        symbols: &[String],
        lookback: usize,
        timestep: Timestep,
    ) -> Result<HashMap<String, BarSet>> {
        // `limit` counts data points across all symbols, not per symbol.
        let limit = ((lookback + 2) * symbols.len()).min(MAX_BARS_LIMIT);
        let start = window_start(lookback, timestep, Utc::now());
        let url = format!("{}/v2/stocks/bars", self.data_base_url);

        let mut merged: HashMap<String, Vec<Bar>> = HashMap::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(&url).query(&[
                ("symbols", symbols.join(",")),
                ("timeframe", timestep.as_timeframe().to_string()),
                ("start", start.to_rfc3339()),
                ("limit", limit.to_string()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token.as_str())]);
            }

            let response = self
                .authed(request)
                .send()
                .await
                .map_err(BrokerError::from)?;

            let body: BarsResponse = Self::check(response)
                .await?
                .json()
                .await
                .context("Failed to parse bars response")?;

            for (symbol, bars) in body.bars {
                merged.entry(symbol).or_default().extend(bars);
            }

            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(symbols = merged.len(), "Fetched bar windows");

        Ok(merged
            .into_iter()
            .map(|(symbol, bars)| (symbol.clone(), BarSet::new(symbol, bars)))
            .collect())
    }
}

#[async_trait]
impl Broker for AlpacaClient {
    #[instrument(skip(self, order), fields(symbol = %order.symbol))]
    async fn submit_order(&self, order: &Order) -> Result<OrderId> {
        let url = format!("{}/v2/orders", self.trading_base_url);

        let mut body = serde_json::json!({
            "symbol": order.symbol,
            "qty": order.quantity.to_string(),
            "side": order.side.as_str(),
            "type": "market",
            "time_in_force": "day",
        });
        if let Some(stop) = order.stop_price {
            body["stop_loss"] = serde_json::json!({ "stop_price": stop.to_string() });
        }
        if let Some(limit) = order.take_profit_price {
            body["take_profit"] = serde_json::json!({ "limit_price": limit.to_string() });
        }

        let response = self
            .authed(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(BrokerError::from)?;

        let submitted: OrderResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse order response")?;

        debug!(order_id = %submitted.id, "Order accepted");
        Ok(submitted.id)
    }

    #[instrument(skip(self))]
    async fn get_position(&self, symbol: &str) -> Result<Option<Position>> {
        let url = format!("{}/v2/positions/{}", self.trading_base_url, symbol);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(BrokerError::from)?;

        // Alpaca answers 404 for a flat symbol.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let position: PositionResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse position response")?;

        Ok(Some(Position {
            symbol: position.symbol,
            quantity: position.qty,
        }))
    }

    #[instrument(skip(self))]
    async fn get_cash(&self) -> Result<Decimal> {
        Ok(self.get_account().await?.cash)
    }

    #[instrument(skip(self))]
    async fn portfolio_value(&self) -> Result<Decimal> {
        Ok(self.get_account().await?.portfolio_value)
    }

    #[instrument(skip(self))]
    async fn is_market_open(&self) -> Result<bool> {
        let url = format!("{}/v2/clock", self.trading_base_url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(BrokerError::from)?;

        let clock: ClockResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse clock response")?;

        Ok(clock.is_open)
    }
}

impl AlpacaClient {
    async fn get_account(&self) -> Result<AccountResponse> {
        let url = format!("{}/v2/account", self.trading_base_url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(BrokerError::from)?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse account response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::types::{OrderRequest, OrderSide};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_client(server: &MockServer) -> AlpacaClient {
        let config = AlpacaConfig {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            paper: true,
        };
        AlpacaClient::with_base_urls(&config, server.uri(), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_get_bars_parses_multi_symbol_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/bars"))
            .and(header("APCA-API-KEY-ID", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bars": {
                    "AAPL": [
                        {"t": "2024-01-02T05:00:00Z", "o": 100.0, "h": 101.0, "l": 99.0, "c": 100.5, "v": 1000},
                        {"t": "2024-01-03T05:00:00Z", "o": 100.5, "h": 103.0, "l": 100.0, "c": 102.0, "v": 1200}
                    ]
                },
                "next_page_token": null
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let bars = client
            .get_bars(&["AAPL".to_string()], 2, Timestep::Day)
            .await
            .unwrap();

        let aapl = bars.get("AAPL").expect("AAPL bars present");
        assert_eq!(aapl.bars.len(), 2);
        assert_eq!(aapl.last_price(), Some(dec!(102.0)));
    }

    #[tokio::test]
    async fn test_get_bars_requests_a_window_covering_the_lookback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/bars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bars": {},
                "next_page_token": null
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        client
            .get_bars(&["AAPL".to_string()], 2, Timestep::Day)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let query: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        // Without an explicit start the venue serves only the current day,
        // which can never fill a multi-bar daily window.
        let start = query
            .iter()
            .find(|(k, _)| k == "start")
            .map(|(_, v)| v.clone())
            .expect("start param present");
        let start: chrono::DateTime<Utc> = start.parse().unwrap();
        // 4 bars requested; the calendar window must at least cover them.
        assert!(Utc::now() - start >= Duration::days(4));

        assert!(query.iter().any(|(k, v)| k == "limit" && v == "4"));
    }

    #[tokio::test]
    async fn test_get_bars_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/bars"))
            .and(query_param_is_missing("page_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bars": {
                    "AAPL": [
                        {"t": "2024-01-02T05:00:00Z", "o": 100.0, "h": 101.0, "l": 99.0, "c": 100.5, "v": 1000}
                    ]
                },
                "next_page_token": "tok-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/stocks/bars"))
            .and(query_param("page_token", "tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bars": {
                    "AAPL": [
                        {"t": "2024-01-03T05:00:00Z", "o": 100.5, "h": 103.0, "l": 100.0, "c": 102.0, "v": 1200}
                    ]
                },
                "next_page_token": null
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let bars = client
            .get_bars(&["AAPL".to_string()], 2, Timestep::Day)
            .await
            .unwrap();

        let aapl = bars.get("AAPL").expect("AAPL bars present");
        assert_eq!(aapl.bars.len(), 2);
        assert_eq!(aapl.last_price(), Some(dec!(102.0)));
    }

    #[tokio::test]
    async fn test_account_fields_decoded_from_strings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cash": "25000.50",
                "portfolio_value": "31000.00"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        assert_eq!(client.get_cash().await.unwrap(), dec!(25000.50));
        assert_eq!(client.portfolio_value().await.unwrap(), dec!(31000.00));
    }

    #[tokio::test]
    async fn test_clock_reports_market_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/clock"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"is_open": true, "timestamp": "2024-01-02T15:00:00Z"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        assert!(client.is_market_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_flat_position_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/positions/AAPL"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        assert!(client.get_position("AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submit_order_returns_broker_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/orders"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "order-123", "status": "accepted"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let order = client.create_order(OrderRequest::new("AAPL", dec!(10), OrderSide::Buy));
        let id = client.submit_order(&order).await.unwrap();
        assert_eq!(id, "order-123");
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/account"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client.get_cash().await.unwrap_err();
        let broker_err = err.downcast_ref::<BrokerError>().expect("BrokerError");
        match broker_err {
            BrokerError::Api { status, message } => {
                assert_eq!(*status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
