//! Alpaca REST API client (trading + market data).

use std::time::Duration;

use chrono::NaiveDate;
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use super::types::{
    AccountResponse, BarsResponse, CalendarDay, ClockResponse, LatestTradeResponse,
    OrderRequest, OrderResponse, PositionResponse,
};
use crate::error::BrokerError;

/// Paper trading endpoint.
pub const PAPER_URL: &str = "https://paper-api.alpaca.markets";
/// Market data endpoint.
pub const DATA_URL: &str = "https://data.alpaca.markets";

/// Blocking Alpaca REST client.
pub struct AlpacaClient {
    client: Client,
    api_key: Zeroizing<String>,
    secret_key: Zeroizing<String>,
    trading_url: String,
    data_url: String,
    feed: String,
}

impl AlpacaClient {
    /// Create a client. `feed` selects the market data feed (`iex` or `sip`).
    pub fn new(
        api_key: &str,
        secret_key: &str,
        trading_url: &str,
        data_url: &str,
        feed: &str,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: Zeroizing::new(api_key.to_string()),
            secret_key: Zeroizing::new(secret_key.to_string()),
            trading_url: trading_url.trim_end_matches('/').to_string(),
            data_url: data_url.trim_end_matches('/').to_string(),
            feed: feed.to_string(),
        })
    }

    /// GET /v2/account
    pub fn account(&self) -> Result<AccountResponse, BrokerError> {
        let url = format!("{}/v2/account", self.trading_url);
        self.fetch(self.client.get(&url), "/v2/account")
    }

    /// GET /v2/positions
    pub fn positions(&self) -> Result<Vec<PositionResponse>, BrokerError> {
        let url = format!("{}/v2/positions", self.trading_url);
        self.fetch(self.client.get(&url), "/v2/positions")
    }

    /// GET /v2/orders?status=open
    pub fn open_orders(&self) -> Result<Vec<OrderResponse>, BrokerError> {
        let url = format!("{}/v2/orders", self.trading_url);
        let req = self
            .client
            .get(&url)
            .query(&[("status", "open"), ("limit", "500")]);
        self.fetch(req, "/v2/orders")
    }

    /// POST /v2/orders
    pub fn submit_order(&self, order: &OrderRequest<'_>) -> Result<OrderResponse, BrokerError> {
        let url = format!("{}/v2/orders", self.trading_url);
        debug!(
            "Submitting Alpaca order: {} {} {} ({})",
            order.side, order.qty, order.symbol, order.order_type
        );
        let resp = self.send(self.client.post(&url).json(order), "/v2/orders")?;
        if resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = resp.text().unwrap_or_default();
            return Err(BrokerError::Rejected {
                symbol: order.symbol.to_string(),
                reason: body,
            });
        }
        parse_json(check_status(resp, "/v2/orders")?, "/v2/orders")
    }

    /// DELETE /v2/orders/{id}
    pub fn cancel_order(&self, id: &str) -> Result<(), BrokerError> {
        let url = format!("{}/v2/orders/{id}", self.trading_url);
        let resp = self.send(self.client.delete(&url), "/v2/orders/{id}")?;
        check_status(resp, "/v2/orders/{id}").map(|_| ())
    }

    /// DELETE /v2/positions/{symbol}
    pub fn close_position(&self, symbol: &str) -> Result<(), BrokerError> {
        let url = format!("{}/v2/positions/{symbol}", self.trading_url);
        let resp = self.send(self.client.delete(&url), "/v2/positions/{symbol}")?;
        check_status(resp, "/v2/positions/{symbol}").map(|_| ())
    }

    /// GET /v2/clock
    pub fn clock(&self) -> Result<ClockResponse, BrokerError> {
        let url = format!("{}/v2/clock", self.trading_url);
        self.fetch(self.client.get(&url), "/v2/clock")
    }

    /// GET /v2/calendar for `[start, end]`.
    pub fn calendar(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<CalendarDay>, BrokerError> {
        let url = format!("{}/v2/calendar", self.trading_url);
        let req = self.client.get(&url).query(&[
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
        ]);
        self.fetch(req, "/v2/calendar")
    }

    /// GET /v2/stocks/{symbol}/trades/latest
    pub fn latest_trade(&self, symbol: &str) -> Result<LatestTradeResponse, BrokerError> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.data_url);
        let req = self.client.get(&url).query(&[("feed", self.feed.as_str())]);
        self.fetch(req, "/v2/stocks/{symbol}/trades/latest")
    }

    /// GET /v2/stocks/bars, one page of adjusted daily bars.
    pub fn daily_bars_page(
        &self,
        symbols: &str,
        start: NaiveDate,
        end: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<BarsResponse, BrokerError> {
        let url = format!("{}/v2/stocks/bars", self.data_url);
        let mut query = vec![
            ("symbols", symbols.to_string()),
            ("timeframe", "1Day".to_string()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
            ("adjustment", "all".to_string()),
            ("limit", "10000".to_string()),
            ("feed", self.feed.clone()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }
        self.fetch(self.client.get(&url).query(&query), "/v2/stocks/bars")
    }

    fn send(&self, req: RequestBuilder, endpoint: &str) -> Result<Response, BrokerError> {
        req.header("APCA-API-KEY-ID", self.api_key.as_str())
            .header("APCA-API-SECRET-KEY", self.secret_key.as_str())
            .send()
            .map_err(|e| BrokerError::Connection(format!("{endpoint} request failed: {e}")))
    }

    fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder, endpoint: &str) -> Result<T, BrokerError> {
        let resp = self.send(req, endpoint)?;
        parse_json(check_status(resp, endpoint)?, endpoint)
    }
}

fn check_status(resp: Response, endpoint: &str) -> Result<Response, BrokerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(BrokerError::Auth(format!("{endpoint}: invalid API key"))),
        StatusCode::TOO_MANY_REQUESTS => Err(BrokerError::RateLimit),
        _ => Err(BrokerError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: resp.text().unwrap_or_default(),
        }),
    }
}

fn parse_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T, BrokerError> {
    resp.json::<T>()
        .map_err(|e| BrokerError::Parse(format!("{endpoint}: {e}")))
}
