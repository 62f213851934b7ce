//! Frame parsing for the Polymarket CLOB market stream.
//!
//! The first frame after subscribing is a JSON array of full book snapshots;
//! later frames are single objects keyed by `event_type`. Incremental
//! `price_changes` frames are dropped; book state refreshes on the next full
//! snapshot.

use connector_core::ConnectorError;
use model::{Price, Quantity};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub token_id: String,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
    pub exchange_ts_ns: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeFrame {
    pub token_id: String,
    pub price: Price,
    pub quantity: Quantity,
    pub is_buy: bool,
    pub exchange_ts_ns: u64,
}

#[derive(Debug, PartialEq)]
pub enum PolyMessage {
    /// Full book snapshots; the subscribe reply batches one per token.
    Books(Vec<BookFrame>),
    Trade(TradeFrame),
    /// `price_changes`, pongs, and unknown event types.
    Ignored,
}

#[derive(Deserialize)]
struct RawBook {
    asset_id: String,
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawLevel {
    price: serde_json::Value,
    size: serde_json::Value,
}

#[derive(Deserialize)]
struct RawTrade {
    asset_id: String,
    price: serde_json::Value,
    size: serde_json::Value,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
}

/// Fields arrive as strings or bare numbers depending on the event type.
fn fixed_from_value(value: &serde_json::Value) -> Option<Price> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64().map(Price::from_f64),
        _ => None,
    }
}

fn ts_ns_from_value(value: Option<&serde_json::Value>) -> u64 {
    let ms = match value {
        Some(serde_json::Value::String(s)) => s.parse::<u64>().unwrap_or(0),
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };
    ms * 1_000_000
}

fn parse_levels(rows: &[RawLevel], context: &str) -> Vec<(Price, Quantity)> {
    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(price), Some(size)) = (fixed_from_value(&row.price), fixed_from_value(&row.size))
        else {
            warn!(context, "skipping unparsable level row");
            continue;
        };
        // Zero rows mark removed levels in snapshots; drop them.
        if price <= Price::ZERO || size <= Quantity::ZERO {
            continue;
        }
        levels.push((price, size));
    }
    levels
}

fn book_from_raw(raw: RawBook) -> BookFrame {
    let exchange_ts_ns = ts_ns_from_value(raw.timestamp.as_ref());
    BookFrame {
        token_id: raw.asset_id,
        bids: parse_levels(&raw.bids, "polymarket bids"),
        asks: parse_levels(&raw.asks, "polymarket asks"),
        exchange_ts_ns,
    }
}

pub fn parse_message(text: &str) -> Result<PolyMessage, ConnectorError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("pong") {
        return Ok(PolyMessage::Ignored);
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| ConnectorError::Parse(e.to_string()))?;

    // Initial reply: an array of book snapshots.
    if let serde_json::Value::Array(items) = value {
        let mut books = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<RawBook>(item) {
                Ok(raw) => books.push(book_from_raw(raw)),
                Err(_) => warn!("skipping malformed snapshot entry"),
            }
        }
        return Ok(PolyMessage::Books(books));
    }

    if value.get("price_changes").is_some() {
        return Ok(PolyMessage::Ignored);
    }

    let Some(event_type) = value
        .get("event_type")
        .and_then(|t| t.as_str())
        .map(String::from)
    else {
        return Ok(PolyMessage::Ignored);
    };

    match event_type.as_str() {
        "book" => {
            let raw: RawBook = serde_json::from_value(value)
                .map_err(|e| ConnectorError::Parse(e.to_string()))?;
            Ok(PolyMessage::Books(vec![book_from_raw(raw)]))
        }
        "last_trade_price" | "trade" => {
            let raw: RawTrade = serde_json::from_value(value)
                .map_err(|e| ConnectorError::Parse(e.to_string()))?;
            let (Some(price), Some(quantity)) =
                (fixed_from_value(&raw.price), fixed_from_value(&raw.size))
            else {
                warn!("dropping trade with unparsable price or size");
                return Ok(PolyMessage::Ignored);
            };
            Ok(PolyMessage::Trade(TradeFrame {
                token_id: raw.asset_id,
                price,
                quantity,
                is_buy: raw.side.as_deref() == Some("BUY"),
                exchange_ts_ns: ts_ns_from_value(raw.timestamp.as_ref()),
            }))
        }
        _ => Ok(PolyMessage::Ignored),
    }
}
