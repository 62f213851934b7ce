//! Frame parsing for the Bybit v5 public stream.

use connector_core::ConnectorError;
use model::{Price, Quantity};
use serde::Deserialize;
use tracing::warn;

/// One parsed book frame, still keyed by the venue symbol string.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub symbol: String,
    pub is_snapshot: bool,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
    /// Frame timestamp in nanoseconds, 0 when the frame carries none.
    pub exchange_ts_ns: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeFrame {
    pub symbol: String,
    pub price: Price,
    pub quantity: Quantity,
    pub is_buy: bool,
    pub exchange_ts_ns: u64,
}

#[derive(Debug, PartialEq)]
pub enum BybitMessage {
    Book(BookFrame),
    Trades(Vec<TradeFrame>),
    /// Pong, subscription ack, or any unknown topic.
    Ignored,
}

#[derive(Deserialize)]
struct RawBookFrame {
    #[serde(rename = "type")]
    update_kind: Option<String>,
    ts: Option<u64>,
    data: RawBookData,
}

#[derive(Deserialize)]
struct RawBookData {
    s: String,
    #[serde(default)]
    b: Vec<(String, String)>,
    #[serde(default)]
    a: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct RawTradeFrame {
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawTradeRow {
    s: String,
    p: String,
    v: String,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "T")]
    ts_ms: Option<u64>,
}

pub(crate) fn is_buy_side(side: &str) -> bool {
    matches!(side, "buy" | "Buy" | "BUY" | "B" | "b")
}

/// Parse one side's level rows, skipping rows that fail the strict numeric
/// parse.
pub(crate) fn parse_levels(rows: &[(String, String)], context: &str) -> Vec<(Price, Quantity)> {
    let mut levels = Vec::with_capacity(rows.len());
    for (price, quantity) in rows {
        match (price.parse::<Price>(), quantity.parse::<Quantity>()) {
            (Ok(price), Ok(quantity)) => levels.push((price, quantity)),
            _ => {
                warn!(context, price = %price, quantity = %quantity, "skipping invalid level row");
            }
        }
    }
    levels
}

pub fn parse_message(text: &str) -> Result<BybitMessage, ConnectorError> {
    if text == "pong" {
        return Ok(BybitMessage::Ignored);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ConnectorError::Parse(e.to_string()))?;

    let Some(topic) = value.get("topic").and_then(|t| t.as_str()).map(String::from) else {
        // Subscription acks and op replies carry no topic.
        return Ok(BybitMessage::Ignored);
    };

    if topic.starts_with("orderbook.") {
        let frame: RawBookFrame =
            serde_json::from_value(value).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let is_snapshot = frame.update_kind.as_deref() != Some("delta");
        Ok(BybitMessage::Book(BookFrame {
            symbol: frame.data.s,
            is_snapshot,
            bids: parse_levels(&frame.data.b, "bybit bids"),
            asks: parse_levels(&frame.data.a, "bybit asks"),
            exchange_ts_ns: frame.ts.unwrap_or(0) * 1_000_000,
        }))
    } else if topic.starts_with("publicTrade.") {
        let frame: RawTradeFrame =
            serde_json::from_value(value).map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let mut trades = Vec::with_capacity(frame.data.len());
        for row in frame.data {
            let Ok(row) = serde_json::from_value::<RawTradeRow>(row) else {
                warn!("skipping malformed trade row");
                continue;
            };
            let (Ok(price), Ok(quantity)) = (row.p.parse::<Price>(), row.v.parse::<Quantity>())
            else {
                warn!(price = %row.p, quantity = %row.v, "skipping invalid trade row");
                continue;
            };
            trades.push(TradeFrame {
                symbol: row.s,
                price,
                quantity,
                is_buy: is_buy_side(&row.side),
                exchange_ts_ns: row.ts_ms.unwrap_or(0) * 1_000_000,
            });
        }
        Ok(BybitMessage::Trades(trades))
    } else {
        Ok(BybitMessage::Ignored)
    }
}
