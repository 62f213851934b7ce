//! Frame parsing for the Bitget v2 public stream.

use connector_core::ConnectorError;
use model::{Price, Quantity};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub symbol: String,
    pub is_snapshot: bool,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
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
pub enum BitgetMessage {
    Book(BookFrame),
    Trades(Vec<TradeFrame>),
    Ignored,
}

#[derive(Deserialize)]
struct RawFrame {
    action: Option<String>,
    arg: Option<RawArg>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawArg {
    channel: String,
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Deserialize)]
struct RawBookEntry {
    #[serde(default)]
    bids: Vec<(String, String)>,
    #[serde(default)]
    asks: Vec<(String, String)>,
    ts: Option<String>,
}

#[derive(Deserialize)]
struct RawTradeRow {
    price: String,
    size: String,
    side: String,
    ts: Option<String>,
}

fn parse_levels(rows: &[(String, String)], context: &str) -> Vec<(Price, Quantity)> {
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

fn ts_ms_to_ns(ts: Option<&str>) -> u64 {
    ts.and_then(|t| t.parse::<u64>().ok()).unwrap_or(0) * 1_000_000
}

pub fn parse_message(text: &str) -> Result<BitgetMessage, ConnectorError> {
    if text == "pong" {
        return Ok(BitgetMessage::Ignored);
    }

    let frame: RawFrame =
        serde_json::from_str(text).map_err(|e| ConnectorError::Parse(e.to_string()))?;

    let Some(arg) = frame.arg else {
        // Subscribe acks, login replies and errors carry no arg/data pair.
        return Ok(BitgetMessage::Ignored);
    };
    if frame.data.is_empty() {
        return Ok(BitgetMessage::Ignored);
    }

    if arg.channel.starts_with("books") {
        // An omitted action field counts as a snapshot.
        let is_snapshot = frame.action.as_deref() != Some("update");

        let mut bids = Vec::new();
        let mut asks = Vec::new();
        let mut exchange_ts_ns = 0;
        for entry in frame.data {
            let Ok(entry) = serde_json::from_value::<RawBookEntry>(entry) else {
                warn!("skipping malformed book entry");
                continue;
            };
            bids.extend(parse_levels(&entry.bids, "bitget bids"));
            asks.extend(parse_levels(&entry.asks, "bitget asks"));
            if exchange_ts_ns == 0 {
                exchange_ts_ns = ts_ms_to_ns(entry.ts.as_deref());
            }
        }

        Ok(BitgetMessage::Book(BookFrame {
            symbol: arg.inst_id,
            is_snapshot,
            bids,
            asks,
            exchange_ts_ns,
        }))
    } else if arg.channel == "trade" {
        let mut trades = Vec::with_capacity(frame.data.len());
        for row in frame.data {
            let Ok(row) = serde_json::from_value::<RawTradeRow>(row) else {
                warn!("skipping malformed trade row");
                continue;
            };
            let (Ok(price), Ok(quantity)) =
                (row.price.parse::<Price>(), row.size.parse::<Quantity>())
            else {
                warn!(price = %row.price, quantity = %row.size, "skipping invalid trade row");
                continue;
            };
            trades.push(TradeFrame {
                symbol: arg.inst_id.clone(),
                price,
                quantity,
                is_buy: matches!(row.side.as_str(), "buy" | "Buy" | "BUY" | "B" | "b"),
                exchange_ts_ns: ts_ms_to_ns(row.ts.as_deref()),
            });
        }
        Ok(BitgetMessage::Trades(trades))
    } else {
        Ok(BitgetMessage::Ignored)
    }
}
