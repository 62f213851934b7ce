//! Frame parsing for the Hyperliquid websocket stream.

use connector_core::ConnectorError;
use model::{Price, Quantity};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub coin: String,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
    pub exchange_ts_ns: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeFrame {
    pub coin: String,
    pub price: Price,
    pub quantity: Quantity,
    pub is_buy: bool,
    pub exchange_ts_ns: u64,
}

#[derive(Debug, PartialEq)]
pub enum HlMessage {
    /// Every l2Book frame is a full snapshot.
    Book(BookFrame),
    Trades(Vec<TradeFrame>),
    /// Pong, subscription acks, unknown channels.
    Ignored,
}

#[derive(Deserialize)]
struct RawFrame {
    channel: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RawBook {
    coin: String,
    #[serde(default)]
    time: u64,
    levels: Vec<Vec<RawLevel>>,
}

#[derive(Deserialize)]
struct RawLevel {
    px: String,
    sz: String,
}

#[derive(Deserialize)]
struct RawTrade {
    coin: String,
    side: String,
    px: String,
    sz: String,
    #[serde(default)]
    time: u64,
}

fn parse_side(levels: &[RawLevel], context: &str) -> Vec<(Price, Quantity)> {
    let mut out = Vec::with_capacity(levels.len());
    for level in levels {
        match (level.px.parse::<Price>(), level.sz.parse::<Quantity>()) {
            (Ok(price), Ok(quantity)) => out.push((price, quantity)),
            _ => {
                warn!(context, px = %level.px, sz = %level.sz, "skipping invalid level row");
            }
        }
    }
    out
}

pub fn parse_message(text: &str) -> Result<HlMessage, ConnectorError> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|e| ConnectorError::Parse(e.to_string()))?;

    match frame.channel.as_str() {
        "l2Book" => {
            let book: RawBook = serde_json::from_value(frame.data)
                .map_err(|e| ConnectorError::Parse(e.to_string()))?;

            let bids = book
                .levels
                .first()
                .map(|side| parse_side(side, "hyperliquid bids"))
                .unwrap_or_default();
            let asks = book
                .levels
                .get(1)
                .map(|side| parse_side(side, "hyperliquid asks"))
                .unwrap_or_default();

            Ok(HlMessage::Book(BookFrame {
                coin: book.coin,
                bids,
                asks,
                exchange_ts_ns: book.time * 1_000_000,
            }))
        }
        "trades" => {
            let rows: Vec<serde_json::Value> = serde_json::from_value(frame.data)
                .map_err(|e| ConnectorError::Parse(e.to_string()))?;

            let mut trades = Vec::with_capacity(rows.len());
            for row in rows {
                let Ok(row) = serde_json::from_value::<RawTrade>(row) else {
                    warn!("skipping malformed trade row");
                    continue;
                };
                let (Ok(price), Ok(quantity)) = (row.px.parse::<Price>(), row.sz.parse::<Quantity>())
                else {
                    warn!(px = %row.px, sz = %row.sz, "skipping invalid trade row");
                    continue;
                };
                trades.push(TradeFrame {
                    coin: row.coin,
                    price,
                    quantity,
                    is_buy: matches!(row.side.as_str(), "buy" | "Buy" | "BUY" | "B" | "b"),
                    exchange_ts_ns: row.time * 1_000_000,
                });
            }
            Ok(HlMessage::Trades(trades))
        }
        // "pong" and "subscriptionResponse" fall through here.
        _ => Ok(HlMessage::Ignored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_l2book() {
        let frame = r#"{"channel":"l2Book","data":{"coin":"BTC","time":1700000000000,"levels":[[{"px":"30000.5","sz":"0.1","n":2}],[{"px":"30001","sz":"0.2","n":1}]]}}"#;

        let HlMessage::Book(book) = parse_message(frame).unwrap() else {
            panic!("expected book frame");
        };
        assert_eq!(book.coin, "BTC");
        assert_eq!(book.bids, vec![("30000.5".parse().unwrap(), "0.1".parse().unwrap())]);
        assert_eq!(book.asks, vec![("30001".parse().unwrap(), "0.2".parse().unwrap())]);
        assert_eq!(book.exchange_ts_ns, 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_parse_trades() {
        let frame = r#"{"channel":"trades","data":[{"coin":"ETH","side":"B","px":"2000","sz":"1.5","time":1700000000001,"hash":"0x0"}]}"#;

        let HlMessage::Trades(trades) = parse_message(frame).unwrap() else {
            panic!("expected trades");
        };
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].coin, "ETH");
        assert!(trades[0].is_buy);
        assert_eq!(trades[0].exchange_ts_ns, 1_700_000_000_001_000_000);
    }

    #[test]
    fn test_pong_ignored() {
        assert_eq!(
            parse_message(r#"{"channel":"pong"}"#).unwrap(),
            HlMessage::Ignored
        );
        assert_eq!(
            parse_message(r#"{"channel":"subscriptionResponse","data":{}}"#).unwrap(),
            HlMessage::Ignored
        );
    }

    #[test]
    fn test_invalid_level_skipped() {
        let frame = r#"{"channel":"l2Book","data":{"coin":"BTC","time":1,"levels":[[{"px":"bad","sz":"1"},{"px":"30000","sz":"1"}],[]]}}"#;

        let HlMessage::Book(book) = parse_message(frame).unwrap() else {
            panic!("expected book frame");
        };
        assert_eq!(book.bids.len(), 1);
        assert!(book.asks.is_empty());
    }
}
