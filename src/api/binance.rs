use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use sha2::Sha256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{MarketData, OrderExecution};
use crate::config::{BotConfig, ExchangeConfig};
use crate::error::BotError;
use crate::models::{BuyFill, Candle, InstrumentConstraints, SellFill};
use crate::Result;

// Binance spot REST: public market data plus signed account/order endpoints
// Docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
const DEFAULT_MIN_NOTIONAL: f64 = 10.0;
const DEFAULT_QUANTITY_STEP: f64 = 0.000001;

type HmacSha256 = Hmac<Sha256>;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Market data client for one Binance spot symbol
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    symbol: String,
    interval: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    step_size: Option<String>,
    min_notional: Option<String>,
}

impl BinanceClient {
    pub fn new(config: &BotConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.exchange.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let rpm = NonZeroU32::new(config.exchange.requests_per_minute)
            .context("requests_per_minute must be positive")?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: config.exchange.base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.clone(),
            interval: config.timeframe.clone(),
            rate_limiter,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Binance request");

        self.send(self.client.get(&url).query(query), path, BotError::DataUnavailable)
            .await
    }

    /// Rate limit, send and decode. `fail` picks the error variant for this call.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
        fail: fn(String) -> BotError,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = request
            .send()
            .await
            .map_err(|e| fail(format!("{} request failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("{} returned {}: {}", path, status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| fail(format!("{} bad payload: {}", path, e)))
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_recent_candles(&self, limit: usize) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", self.symbol.clone()),
                    ("interval", self.interval.clone()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }

    async fn fetch_reference_price(&self) -> Result<f64> {
        let ticker: TickerPrice = self
            .get_json("/api/v3/ticker/price", &[("symbol", self.symbol.clone())])
            .await?;

        parse_number(&ticker.price, "price")
    }

    async fn instrument_constraints(&self) -> Result<InstrumentConstraints> {
        let info: ExchangeInfo = self
            .get_json("/api/v3/exchangeInfo", &[("symbol", self.symbol.clone())])
            .await?;

        let symbol = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == self.symbol)
            .ok_or_else(|| {
                BotError::DataUnavailable(format!("symbol {} not listed", self.symbol))
            })?;

        let constraints = constraints_from_filters(&symbol.filters)?;
        tracing::info!(
            symbol = %self.symbol,
            step = constraints.quantity_step,
            min_notional = constraints.min_notional,
            "Loaded instrument constraints"
        );
        Ok(constraints)
    }
}

/// API key pair for signed endpoints
#[derive(Clone)]
pub struct BinanceCredentials {
    api_key: String,
    api_secret: String,
}

impl fmt::Debug for BinanceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl BinanceCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Keys from the config file or `REVERSALBOT__EXCHANGE__*`, else `BINANCE_KEY` / `BINANCE_SECRET`
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    fn resolve(config: &ExchangeConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pick = |configured: &Option<String>, var: &str| {
            configured
                .clone()
                .or_else(|| env(var))
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| BotError::Config(format!("testnet mode needs {} or exchange config", var)))
        };

        Ok(Self::new(
            pick(&config.api_key, "BINANCE_KEY")?,
            pick(&config.api_secret, "BINANCE_SECRET")?,
        ))
    }

    /// HMAC-SHA256 of the query string, hex encoded
    pub fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BotError::Config(format!("unusable api secret: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
    #[serde(default)]
    fills: Vec<OrderFill>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderFill {
    price: String,
    qty: String,
    commission: String,
    commission_asset: String,
}

/// Fill summary in quote terms
#[derive(Debug, Clone, PartialEq)]
struct ExecutedOrder {
    order_id: String,
    quantity: f64,
    average_price: f64,
    quote_fees: f64,
}

/// Signed spot account trading one symbol with immediate MARKET orders.
///
/// Shares the HTTP client and rate limiter of the market data client.
pub struct BinanceSpotAccount {
    client: BinanceClient,
    credentials: BinanceCredentials,
    base_asset: String,
    quote_asset: String,
    recv_window_ms: u64,
}

impl BinanceSpotAccount {
    pub fn new(client: BinanceClient, credentials: BinanceCredentials, config: &BotConfig) -> Self {
        Self {
            client,
            credentials,
            base_asset: config.base_asset.clone(),
            quote_asset: config.quote_asset.clone(),
            recv_window_ms: config.exchange.recv_window_ms,
        }
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        fail: fn(String) -> BotError,
    ) -> Result<T> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        query.push(format!("recvWindow={}", self.recv_window_ms));
        query.push(format!("timestamp={}", Utc::now().timestamp_millis()));
        let query = query.join("&");

        let signature = self.credentials.sign(&query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.client.base_url, path, query, signature
        );
        tracing::debug!(path = path, method = %method, "Binance signed request");

        let request = self
            .client
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.credentials.api_key);
        self.client.send(request, path, fail).await
    }

    async fn market_order(&self, side: &str, quantity: f64) -> Result<ExecutedOrder> {
        if !(quantity > 0.0) || !quantity.is_finite() {
            return Err(BotError::OrderRejected(format!("bad quantity {}", quantity)));
        }

        let client_order_id = Uuid::new_v4().to_string();
        let response: OrderResponse = self
            .signed(
                Method::POST,
                "/api/v3/order",
                &[
                    ("symbol", self.client.symbol.clone()),
                    ("side", side.to_string()),
                    ("type", "MARKET".to_string()),
                    ("quantity", quantity.to_string()),
                    ("newClientOrderId", client_order_id.clone()),
                    ("newOrderRespType", "FULL".to_string()),
                ],
                BotError::OrderRejected,
            )
            .await?;

        let order = summarize_order(&response, &self.base_asset, &self.quote_asset)
            .map_err(|e| BotError::OrderRejected(format!("order {}: {}", response.order_id, e)))?;

        if !(order.quantity > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "{} order {} not filled (status {})",
                side, order.order_id, response.status
            )));
        }
        if order.quantity < quantity * (1.0 - 1e-9) {
            tracing::warn!(
                order_id = %order.order_id,
                client_order_id = %client_order_id,
                "{} partially filled: {} of {}",
                side,
                order.quantity,
                quantity
            );
        }

        tracing::info!(
            order_id = %order.order_id,
            qty = order.quantity,
            price = order.average_price,
            fee = order.quote_fees,
            "Binance {} filled",
            side
        );
        Ok(order)
    }
}

#[async_trait]
impl OrderExecution for BinanceSpotAccount {
    async fn fetch_available_balance(&self, asset: &str) -> Result<f64> {
        let account: AccountInfo = self
            .signed(Method::GET, "/api/v3/account", &[], BotError::DataUnavailable)
            .await?;

        match account
            .balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
        {
            Some(balance) => parse_number(&balance.free, "free"),
            None => Ok(0.0),
        }
    }

    async fn submit_market_buy(&self, quantity: f64) -> Result<BuyFill> {
        let order = self.market_order("BUY", quantity).await?;
        Ok(BuyFill {
            order_id: order.order_id,
            filled_quantity: order.quantity,
            filled_price: order.average_price,
            fees_paid: order.quote_fees,
        })
    }

    async fn submit_market_sell(&self, quantity: f64) -> Result<SellFill> {
        let order = self.market_order("SELL", quantity).await?;
        Ok(SellFill {
            order_id: order.order_id,
            filled_price: order.average_price,
            fees_paid: order.quote_fees,
        })
    }
}

/// Average price from `cummulativeQuoteQty / executedQty`, falling back to the
/// fills. Commissions are converted to the quote asset; other assets (e.g. BNB)
/// are left out.
fn summarize_order(response: &OrderResponse, base_asset: &str, quote_asset: &str) -> Result<ExecutedOrder> {
    let quantity = parse_number(&response.executed_qty, "executedQty")?;
    let quote_qty = parse_number(&response.cummulative_quote_qty, "cummulativeQuoteQty")?;

    let mut fill_qty = 0.0;
    let mut fill_quote = 0.0;
    let mut quote_fees = 0.0;
    for fill in &response.fills {
        let price = parse_number(&fill.price, "fill price")?;
        let qty = parse_number(&fill.qty, "fill qty")?;
        let commission = parse_number(&fill.commission, "commission")?;
        fill_qty += qty;
        fill_quote += qty * price;

        if fill.commission_asset.eq_ignore_ascii_case(quote_asset) {
            quote_fees += commission;
        } else if fill.commission_asset.eq_ignore_ascii_case(base_asset) {
            quote_fees += commission * price;
        } else {
            tracing::debug!(
                "Commission {} {} not counted in quote fees",
                commission,
                fill.commission_asset
            );
        }
    }

    let average_price = if quantity > 0.0 && quote_qty > 0.0 {
        quote_qty / quantity
    } else if fill_qty > 0.0 {
        fill_quote / fill_qty
    } else {
        0.0
    };

    Ok(ExecutedOrder {
        order_id: response.order_id.to_string(),
        quantity,
        average_price,
        quote_fees,
    })
}

fn constraints_from_filters(filters: &[SymbolFilter]) -> Result<InstrumentConstraints> {
    let mut quantity_step = DEFAULT_QUANTITY_STEP;
    let mut min_notional = DEFAULT_MIN_NOTIONAL;

    for filter in filters {
        match filter.filter_type.as_str() {
            "LOT_SIZE" => {
                if let Some(step) = &filter.step_size {
                    let step = parse_number(step, "stepSize")?;
                    if step > 0.0 {
                        quantity_step = step;
                    }
                }
            }
            "NOTIONAL" | "MIN_NOTIONAL" => {
                if let Some(min) = &filter.min_notional {
                    min_notional = parse_number(min, "minNotional")?;
                }
            }
            _ => {}
        }
    }

    Ok(InstrumentConstraints {
        quantity_step,
        min_notional,
    })
}

/// Kline row: [open_time_ms, open, high, low, close, volume, close_time_ms, ...]
fn parse_kline(row: &[serde_json::Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(BotError::DataUnavailable(format!(
            "kline row has {} fields",
            row.len()
        )));
    }

    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| BotError::DataUnavailable("kline open time not an integer".to_string()))?;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| BotError::DataUnavailable(format!("bad kline time {}", open_time)))?;

    Ok(Candle {
        timestamp,
        open: value_to_f64(&row[1], "open")?,
        high: value_to_f64(&row[2], "high")?,
        low: value_to_f64(&row[3], "low")?,
        close: value_to_f64(&row[4], "close")?,
        volume: value_to_f64(&row[5], "volume")?,
    })
}

fn value_to_f64(value: &serde_json::Value, field: &str) -> Result<f64> {
    match value {
        serde_json::Value::String(s) => parse_number(s, field),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| BotError::DataUnavailable(format!("{} out of range", field))),
        other => Err(BotError::DataUnavailable(format!(
            "{} has unexpected type: {}",
            field, other
        ))),
    }
}

fn parse_number(s: &str, field: &str) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|e| BotError::DataUnavailable(format!("{} '{}' not a number: {}", field, s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_config(base_url: String) -> BotConfig {
        let mut config = BotConfig::default();
        config.exchange.base_url = base_url;
        config
    }

    #[tokio::test]
    async fn test_fetch_recent_candles() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[
                    [1704067200000,"2000.10","2003.00","1999.50","2002.25","12.5",1704067259999,"0",10,"0","0","0"],
                    [1704067260000,"2002.25","2004.00","2001.00","2003.75","8.0",1704067319999,"0",7,"0","0","0"]
                ]"#,
            )
            .create_async()
            .await;

        let client = BinanceClient::new(&test_config(server.url())).unwrap();
        let candles = client.fetch_recent_candles(2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 2000.10);
        assert_eq!(candles[0].low, 1999.50);
        assert_eq!(candles[1].close, 2003.75);
        assert_eq!(candles[1].timestamp.timestamp_millis(), 1704067260000);
    }

    #[tokio::test]
    async fn test_fetch_reference_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()))
            .with_status(200)
            .with_body(r#"{"symbol":"ETHUSDT","price":"2012.34000000"}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&test_config(server.url())).unwrap();
        let price = client.fetch_reference_price().await.unwrap();

        assert_eq!(price, 2012.34);
    }

    #[tokio::test]
    async fn test_instrument_constraints_from_filters() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/exchangeInfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"symbols":[{"symbol":"ETHUSDT","filters":[
                    {"filterType":"PRICE_FILTER","minPrice":"0.01","maxPrice":"1000000.00","tickSize":"0.01"},
                    {"filterType":"LOT_SIZE","minQty":"0.00010000","maxQty":"9000.00000000","stepSize":"0.00010000"},
                    {"filterType":"NOTIONAL","minNotional":"5.00000000","applyMinToMarket":true}
                ]}]}"#,
            )
            .create_async()
            .await;

        let client = BinanceClient::new(&test_config(server.url())).unwrap();
        let constraints = client.instrument_constraints().await.unwrap();

        assert_eq!(constraints.quantity_step, 0.0001);
        assert_eq!(constraints.min_notional, 5.0);
    }

    #[tokio::test]
    async fn test_constraints_default_when_filters_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/exchangeInfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"symbols":[{"symbol":"ETHUSDT","filters":[]}]}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&test_config(server.url())).unwrap();
        let constraints = client.instrument_constraints().await.unwrap();

        assert_eq!(constraints.quantity_step, DEFAULT_QUANTITY_STEP);
        assert_eq!(constraints.min_notional, DEFAULT_MIN_NOTIONAL);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_data_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = BinanceClient::new(&test_config(server.url())).unwrap();
        let err = client.fetch_reference_price().await.unwrap_err();

        assert!(matches!(err, BotError::DataUnavailable(_)));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_parse_kline_rejects_short_row() {
        let row = vec![serde_json::json!(1704067200000i64), serde_json::json!("1.0")];
        assert!(parse_kline(&row).is_err());
    }

    fn test_account(server_url: String) -> BinanceSpotAccount {
        let config = test_config(server_url);
        let client = BinanceClient::new(&config).unwrap();
        BinanceSpotAccount::new(client, BinanceCredentials::new("test-key", "test-secret"), &config)
    }

    #[test]
    fn test_sign_matches_documented_vector() {
        let credentials = BinanceCredentials::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            credentials.sign(query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_credentials_resolution() {
        let mut exchange = ExchangeConfig::default();
        let env = |name: &str| match name {
            "BINANCE_KEY" => Some("env-key".to_string()),
            "BINANCE_SECRET" => Some("env-secret".to_string()),
            _ => None,
        };

        let creds = BinanceCredentials::resolve(&exchange, env).unwrap();
        assert_eq!(creds.api_key, "env-key");
        assert_eq!(creds.api_secret, "env-secret");

        exchange.api_key = Some("file-key".to_string());
        let creds = BinanceCredentials::resolve(&exchange, env).unwrap();
        assert_eq!(creds.api_key, "file-key");
        assert_eq!(creds.api_secret, "env-secret");
        assert!(!format!("{:?}", creds).contains("env-secret"));

        let err = BinanceCredentials::resolve(&ExchangeConfig::default(), |_| None).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[tokio::test]
    async fn test_account_balance_is_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::Regex(
                r"^recvWindow=5000&timestamp=\d+&signature=[0-9a-f]{64}$".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"makerCommission":10,"balances":[
                    {"asset":"ETH","free":"0.00600000","locked":"0.00000000"},
                    {"asset":"USDT","free":"987.98800000","locked":"0.00000000"}
                ]}"#,
            )
            .expect(3)
            .create_async()
            .await;

        let account = test_account(server.url());

        assert_eq!(account.fetch_available_balance("ETH").await.unwrap(), 0.006);
        assert_eq!(account.fetch_available_balance("USDT").await.unwrap(), 987.988);
        assert_eq!(account.fetch_available_balance("BNB").await.unwrap(), 0.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_market_buy_reads_fills() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::Regex(
                r"^symbol=ETHUSDT&side=BUY&type=MARKET&quantity=0.006&newClientOrderId=[0-9a-f-]{36}&newOrderRespType=FULL&recvWindow=5000&timestamp=\d+&signature=[0-9a-f]{64}$".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"symbol":"ETHUSDT","orderId":28,"status":"FILLED","type":"MARKET","side":"BUY",
                    "origQty":"0.00600000","executedQty":"0.00600000","cummulativeQuoteQty":"12.01200000",
                    "fills":[
                        {"price":"2001.00","qty":"0.00300000","commission":"0.00000300","commissionAsset":"ETH","tradeId":56},
                        {"price":"2003.00","qty":"0.00300000","commission":"0.00000300","commissionAsset":"ETH","tradeId":57}
                    ]}"#,
            )
            .create_async()
            .await;

        let account = test_account(server.url());
        let fill = account.submit_market_buy(0.006).await.unwrap();

        mock.assert_async().await;
        assert_eq!(fill.order_id, "28");
        assert_eq!(fill.filled_quantity, 0.006);
        assert!((fill.filled_price - 2002.0).abs() < 1e-9);
        assert!((fill.fees_paid - 0.012012).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_market_sell_quote_commission() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Regex(r"side=SELL&type=MARKET&quantity=0.006&".into()))
            .with_status(200)
            .with_body(
                r#"{"orderId":29,"status":"FILLED","executedQty":"0.00600000","cummulativeQuoteQty":"12.07200000",
                    "fills":[{"price":"2012.00","qty":"0.00600000","commission":"0.01207200","commissionAsset":"USDT"}]}"#,
            )
            .create_async()
            .await;

        let account = test_account(server.url());
        let fill = account.submit_market_sell(0.006).await.unwrap();

        assert_eq!(fill.order_id, "29");
        assert!((fill.filled_price - 2012.0).abs() < 1e-9);
        assert!((fill.fees_paid - 0.012072).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_exchange_rejection_maps_to_order_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#)
            .create_async()
            .await;

        let account = test_account(server.url());
        let err = account.submit_market_buy(0.006).await.unwrap_err();

        assert!(matches!(err, BotError::OrderRejected(_)));
        assert!(err.to_string().contains("-2010"));
    }

    #[tokio::test]
    async fn test_expired_market_order_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"orderId":30,"status":"EXPIRED","executedQty":"0.00000000","cummulativeQuoteQty":"0.00000000","fills":[]}"#,
            )
            .create_async()
            .await;

        let account = test_account(server.url());
        let err = account.submit_market_sell(0.006).await.unwrap_err();

        assert!(matches!(err, BotError::OrderRejected(_)));
        assert!(err.to_string().contains("EXPIRED"));
    }
}
