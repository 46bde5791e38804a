//! Signed REST client.
//!
//! Every call goes through the circuit breaker, then the retrying
//! transport. A successful round trip marks REST as reachable. Failures are
//! reported to the error handler under the `rest` context; a transient
//! failure of a GET is retried there as well before surfacing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::dto::{
    BalanceData, BookData, CancelOrderBody, Envelope, OrderAckData, OrderHistoryData,
    PlaceOrderBody, PositionData, TickerData, TimeData,
};
use super::signer::{
    RequestSigner, HEADER_KEY, HEADER_PASSPHRASE, HEADER_SIGN, HEADER_TIMESTAMP,
};
use super::status::ConnectionStatus;
use crate::domain::{
    AccountBalance, AccountPosition, CancelRequest, OrderAck, OrderBook, OrderRecord,
    OrderRequest, Ticker,
};
use crate::error::{Error, Result};
use crate::port::{ExchangeApi, HistoryQuery};
use crate::resilience::{CircuitBreaker, ErrorHandler, RetryingTransport};

const BALANCE_PATH: &str = "/api/v5/account/balance";
const POSITIONS_PATH: &str = "/api/v5/account/positions";
const TICKER_PATH: &str = "/api/v5/market/ticker";
const BOOKS_PATH: &str = "/api/v5/market/books";
const ORDER_PATH: &str = "/api/v5/trade/order";
const CANCEL_PATH: &str = "/api/v5/trade/cancel-order";
const HISTORY_PATH: &str = "/api/v5/trade/orders-history";
const TIME_PATH: &str = "/api/v5/public/time";

/// Error handler context of REST failures.
pub const REST_CONTEXT: &str = "rest";

pub struct RestApi {
    base_url: Url,
    transport: RetryingTransport,
    breaker: CircuitBreaker,
    signer: RequestSigner,
    status: Arc<ConnectionStatus>,
    errors: Arc<ErrorHandler>,
}

impl RestApi {
    #[allow(clippy::result_large_err)]
    pub fn new(
        base_url: &str,
        transport: RetryingTransport,
        breaker: CircuitBreaker,
        signer: RequestSigner,
        status: Arc<ConnectionStatus>,
        errors: Arc<ErrorHandler>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            transport,
            breaker,
            signer,
            status,
            errors,
        })
    }

    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let request_path = with_query(path, query);
        self.send(Method::GET, request_path, None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<Vec<T>> {
        let body = serde_json::to_string(body)?;
        self.send(Method::POST, path.to_string(), Some(body)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: String,
        body: Option<String>,
    ) -> Result<Vec<T>> {
        let (method_ref, path, body) = (&method, request_path.as_str(), body.as_deref());
        let attempt =
            move || self.breaker.call(move || self.dispatch(method_ref.clone(), path, body));

        let result = match attempt().await {
            Ok(data) => Ok(data),
            Err(err) if err.is_transient() => {
                warn!(path, error = %err, "REST unreachable");
                self.status.set_rest(false);
                if method == Method::GET {
                    let retried = self
                        .errors
                        .handle_with_retry(&err, REST_CONTEXT, attempt)
                        .await;
                    retried.ok_or(err)
                } else {
                    self.errors.handle(&err, REST_CONTEXT).await;
                    Err(err)
                }
            }
            Err(err) => {
                self.errors.handle(&err, REST_CONTEXT).await;
                Err(err)
            }
        };
        if result.is_ok() {
            self.status.set_rest(true);
        }
        result
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: &str,
        body: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.base_url.join(request_path)?;
        let headers = self
            .signer
            .headers(method.as_str(), request_path, body.unwrap_or(""));

        let mut builder = self
            .transport
            .client()
            .request(method.clone(), url)
            .header(HEADER_KEY, headers.key)
            .header(HEADER_SIGN, headers.sign)
            .header(HEADER_TIMESTAMP, headers.timestamp)
            .header(HEADER_PASSPHRASE, headers.passphrase)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }
        let request = builder.build()?;

        debug!(method = %method, path = %request_path, "REST request");
        let response = self.transport.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::ExchangeRejection {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| Error::Protocol(format!("{request_path}: {e}")))?;
        envelope.into_data(status.as_u16())
    }
}

/// `path?query` with form-encoded parameters; the signed path uses the same
/// string.
fn with_query(path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query)
        .finish();
    format!("{path}?{encoded}")
}

fn first<T>(data: Vec<T>, what: &str) -> Result<T> {
    data.into_iter()
        .next()
        .ok_or_else(|| Error::Protocol(format!("empty {what} response")))
}

#[async_trait]
impl ExchangeApi for RestApi {
    async fn get_account_balance(&self) -> Result<AccountBalance> {
        let data: Vec<BalanceData> = self.get(BALANCE_PATH, &[]).await?;
        AccountBalance::try_from(data)
    }

    async fn get_positions(&self) -> Result<Vec<AccountPosition>> {
        let data: Vec<PositionData> = self.get(POSITIONS_PATH, &[]).await?;
        data.into_iter().map(AccountPosition::try_from).collect()
    }

    async fn get_ticker(&self, inst_id: &str) -> Result<Ticker> {
        let data: Vec<TickerData> = self.get(TICKER_PATH, &[("instId", inst_id)]).await?;
        Ticker::try_from(first(data, "ticker")?)
    }

    async fn get_orderbook(&self, inst_id: &str, depth: usize) -> Result<OrderBook> {
        let depth = depth.to_string();
        let data: Vec<BookData> = self
            .get(BOOKS_PATH, &[("instId", inst_id), ("sz", &depth)])
            .await?;
        first(data, "order book")?.into_book(inst_id)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let data: Vec<OrderAckData> = self.post(ORDER_PATH, &PlaceOrderBody::from(order)).await?;
        Ok(first(data, "order")?.into())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck> {
        if !request.has_id() {
            return Err(Error::InvalidRequest(
                "either ordId or clOrdId must be provided".into(),
            ));
        }
        let data: Vec<OrderAckData> = self
            .post(CANCEL_PATH, &CancelOrderBody::from(request))
            .await?;
        Ok(first(data, "cancel")?.into())
    }

    async fn get_order_history(&self, query: &HistoryQuery) -> Result<Vec<OrderRecord>> {
        let limit = query.limit.to_string();
        let data: Vec<OrderHistoryData> = self
            .get(
                HISTORY_PATH,
                &[
                    ("instType", query.inst_type.as_str()),
                    ("state", query.state.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        data.into_iter().map(OrderRecord::try_from).collect()
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        let data: Vec<TimeData> = self.get(TIME_PATH, &[]).await?;
        first(data, "time")?.into_datetime()
    }
}
