//! Wire types of the REST API.
//!
//! Every response is wrapped in `{code, msg, data}`; `code` other than `"0"`
//! is a rejection even when the HTTP status is 200. Numeric fields arrive as
//! strings and an empty string means zero.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountBalance, AccountPosition, Balance, CancelRequest, OrderAck, OrderBook, OrderRecord,
    OrderRequest, OrderType, PriceLevel, Side, Ticker, TradeMode,
};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    /// Unwrap `data`, turning a non-zero `code` into a rejection.
    pub fn into_data(self, status: u16) -> Result<Vec<T>> {
        if self.code != "0" {
            return Err(Error::ExchangeRejection {
                status,
                body: format!("code {}: {}", self.code, self.msg),
            });
        }
        Ok(self.data)
    }
}

/// Parse a numeric string field; empty means zero.
pub fn parse_num(field: &str, value: &str) -> Result<f64> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse()
        .map_err(|_| Error::Protocol(format!("field '{field}' is not numeric: '{value}'")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub inst_id: String,
    #[serde(default)]
    pub last: String,
    #[serde(default)]
    pub bid_px: String,
    #[serde(default)]
    pub ask_px: String,
}

impl TryFrom<TickerData> for Ticker {
    type Error = Error;

    fn try_from(data: TickerData) -> Result<Self> {
        Ok(Self {
            last: parse_num("last", &data.last)?,
            bid: parse_num("bidPx", &data.bid_px)?,
            ask: parse_num("askPx", &data.ask_px)?,
            inst_id: data.inst_id,
        })
    }
}

/// Book level: `[price, size, deprecated, order count]`.
#[derive(Debug, Deserialize)]
pub struct BookData {
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
}

impl BookData {
    pub fn into_book(self, inst_id: &str) -> Result<OrderBook> {
        Ok(OrderBook {
            inst_id: inst_id.to_string(),
            bids: levels(self.bids)?,
            asks: levels(self.asks)?,
        })
    }
}

fn levels(raw: Vec<Vec<String>>) -> Result<Vec<PriceLevel>> {
    raw.iter()
        .map(|level| match level.as_slice() {
            [price, size, ..] => Ok(PriceLevel {
                price: parse_num("px", price)?,
                size: parse_num("sz", size)?,
            }),
            _ => Err(Error::Protocol(format!("malformed book level: {level:?}"))),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct BalanceData {
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub avail_bal: String,
}

impl TryFrom<Vec<BalanceData>> for AccountBalance {
    type Error = Error;

    fn try_from(data: Vec<BalanceData>) -> Result<Self> {
        let details = data
            .into_iter()
            .next()
            .map(|d| d.details)
            .unwrap_or_default()
            .into_iter()
            .map(|d| {
                Ok(Balance {
                    available: parse_num("availBal", &d.avail_bal)?,
                    currency: d.ccy,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { details })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub inst_id: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub avg_px: String,
    #[serde(default)]
    pub upl: String,
}

impl TryFrom<PositionData> for AccountPosition {
    type Error = Error;

    fn try_from(data: PositionData) -> Result<Self> {
        Ok(Self {
            position: parse_num("pos", &data.pos)?,
            average_price: parse_num("avgPx", &data.avg_px)?,
            unrealized_pnl: parse_num("upl", &data.upl)?,
            inst_id: data.inst_id,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody<'a> {
    pub inst_id: &'a str,
    pub td_mode: TradeMode,
    pub side: Side,
    pub ord_type: OrderType,
    pub sz: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<Decimal>,
}

impl<'a> From<&'a OrderRequest> for PlaceOrderBody<'a> {
    fn from(order: &'a OrderRequest) -> Self {
        Self {
            inst_id: &order.inst_id,
            td_mode: order.trade_mode,
            side: order.side,
            ord_type: order.order_type,
            sz: order.size,
            px: order.effective_price(),
        }
    }
}

/// Cancel body; `ordId` wins when both ids are present.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody<'a> {
    pub inst_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<&'a str>,
}

impl<'a> From<&'a CancelRequest> for CancelOrderBody<'a> {
    fn from(request: &'a CancelRequest) -> Self {
        let ord_id = request.order_id.as_deref();
        Self {
            inst_id: &request.inst_id,
            ord_id,
            cl_ord_id: if ord_id.is_some() {
                None
            } else {
                request.client_order_id.as_deref()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAckData {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

impl From<OrderAckData> for OrderAck {
    fn from(data: OrderAckData) -> Self {
        Self {
            order_id: data.ord_id,
            client_order_id: data.cl_ord_id,
            code: data.s_code,
            message: data.s_msg,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryData {
    pub inst_id: String,
    pub ord_id: String,
    pub side: Side,
    #[serde(default)]
    pub px: String,
    #[serde(default)]
    pub sz: String,
    #[serde(default)]
    pub acc_fill_sz: String,
    #[serde(default)]
    pub avg_px: String,
    #[serde(default)]
    pub state: String,
}

impl TryFrom<OrderHistoryData> for OrderRecord {
    type Error = Error;

    fn try_from(data: OrderHistoryData) -> Result<Self> {
        Ok(Self {
            price: parse_num("px", &data.px)?,
            size: parse_num("sz", &data.sz)?,
            filled_size: parse_num("accFillSz", &data.acc_fill_sz)?,
            average_price: parse_num("avgPx", &data.avg_px)?,
            inst_id: data.inst_id,
            order_id: data.ord_id,
            side: data.side,
            state: data.state,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TimeData {
    pub ts: String,
}

impl TimeData {
    pub fn into_datetime(self) -> Result<DateTime<Utc>> {
        let millis: i64 = self
            .ts
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid server time '{}'", self.ts)))?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| Error::Protocol(format!("server time out of range: {millis}")))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn non_zero_code_is_rejection() {
        let envelope: Envelope<TickerData> =
            serde_json::from_str(r#"{"code":"50011","msg":"Too Many Requests","data":[]}"#)
                .unwrap();
        let err = envelope.into_data(200).unwrap_err();
        let Error::ExchangeRejection { status, body } = err else {
            panic!("expected rejection");
        };
        assert_eq!(status, 200);
        assert!(body.contains("50011"));
    }

    #[test]
    fn ticker_strings_become_numbers() {
        let envelope: Envelope<TickerData> = serde_json::from_str(
            r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT","last":"43000.5","bidPx":"43000.1","askPx":"43000.9","ts":"1"}]}"#,
        )
        .unwrap();
        let data = envelope.into_data(200).unwrap().into_iter().next().unwrap();
        let ticker = Ticker::try_from(data).unwrap();
        assert_eq!(ticker.inst_id, "BTC-USDT");
        assert_eq!(ticker.last, 43000.5);
        assert_eq!(ticker.bid, 43000.1);
        assert_eq!(ticker.ask, 43000.9);
    }

    #[test]
    fn empty_numeric_field_is_zero() {
        assert_eq!(parse_num("px", "").unwrap(), 0.0);
        assert!(matches!(parse_num("px", "abc"), Err(Error::Protocol(_))));
    }

    #[test]
    fn book_levels_parse() {
        let data: BookData = serde_json::from_str(
            r#"{"asks":[["41006.8","0.6","0","1"]],"bids":[["41006.3","0.3","0","2"],["41006.0","1.2","0","4"]],"ts":"1"}"#,
        )
        .unwrap();
        let book = data.into_book("BTC-USDT").unwrap();
        assert_eq!(book.best_ask(), Some(41006.8));
        assert_eq!(book.best_bid(), Some(41006.3));
        assert_eq!(book.bids.len(), 2);
    }

    #[test]
    fn balance_reads_first_account() {
        let data: Vec<BalanceData> = serde_json::from_str(
            r#"[{"details":[{"ccy":"USDT","availBal":"120.5"},{"ccy":"BTC","availBal":""}]}]"#,
        )
        .unwrap();
        let balance = AccountBalance::try_from(data).unwrap();
        assert_eq!(balance.available("USDT"), 120.5);
        assert_eq!(balance.available("BTC"), 0.0);
        assert_eq!(balance.available("ETH"), 0.0);
    }

    #[test]
    fn market_order_body_omits_price() {
        let order = OrderRequest::market("BTC-USDT", Side::Buy, dec!(0.01));
        let json = serde_json::to_string(&PlaceOrderBody::from(&order)).unwrap();
        assert_eq!(
            json,
            r#"{"instId":"BTC-USDT","tdMode":"cash","side":"buy","ordType":"market","sz":"0.01"}"#
        );
    }

    #[test]
    fn limit_order_body_carries_price() {
        let order = OrderRequest::limit("BTC-USDT", Side::Buy, dec!(0.01), dec!(30000));
        let json = serde_json::to_string(&PlaceOrderBody::from(&order)).unwrap();
        assert_eq!(
            json,
            r#"{"instId":"BTC-USDT","tdMode":"cash","side":"buy","ordType":"limit","sz":"0.01","px":"30000"}"#
        );
    }

    #[test]
    fn cancel_prefers_order_id() {
        let mut request = CancelRequest::by_order_id("BTC-USDT", "123");
        request.client_order_id = Some("mine".into());
        let json = serde_json::to_string(&CancelOrderBody::from(&request)).unwrap();
        assert_eq!(json, r#"{"instId":"BTC-USDT","ordId":"123"}"#);
    }

    #[test]
    fn server_time_parses_millis() {
        let time = TimeData {
            ts: "1597026383085".into(),
        }
        .into_datetime()
        .unwrap();
        assert_eq!(time.timestamp_millis(), 1_597_026_383_085);
    }
}
