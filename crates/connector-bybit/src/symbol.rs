//! Option symbol parsing.
//!
//! Bybit option symbols look like `BTC-30AUG24-50000-C`, optionally with a
//! `-USDT` settlement suffix.

use chrono::NaiveDate;
use model::{InstrumentType, OptionType, Price, SymbolInfo};

fn month_number(m: &str) -> Option<u32> {
    let month = match m.to_ascii_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

/// Expiry `DDMMMYY` (e.g. `30AUG24`) to nanoseconds since the Unix epoch at
/// midnight UTC.
fn parse_expiry_ns(s: &str) -> Option<u64> {
    let alpha_start = s.find(|c: char| c.is_ascii_alphabetic())?;
    if alpha_start == 0 || s.len() < alpha_start + 3 {
        return None;
    }

    let day: u32 = s[..alpha_start].parse().ok()?;
    let month = month_number(&s[alpha_start..alpha_start + 3])?;
    let year: i32 = s[alpha_start + 3..].parse::<u32>().ok()? as i32 + 2000;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let ns = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_nanos_opt()?;
    u64::try_from(ns).ok()
}

/// Parse `UNDERLYING-DDMMMYY-STRIKE-{C|P}[-USDT]` into option metadata.
/// Returns `None` for anything that does not match the grammar.
pub fn parse_option_symbol(full_symbol: &str) -> Option<SymbolInfo> {
    let stripped = full_symbol.strip_suffix("-USDT").unwrap_or(full_symbol);

    let parts: Vec<&str> = stripped.split('-').collect();
    if parts.len() != 4 {
        return None;
    }

    let expiry_ns = parse_expiry_ns(parts[1])?;

    let strike: Price = parts[2].parse().ok()?;
    if strike <= Price::ZERO {
        return None;
    }

    let option_type = match parts[3] {
        "C" => OptionType::Call,
        "P" => OptionType::Put,
        _ => return None,
    };

    Some(SymbolInfo {
        exchange: "bybit".to_string(),
        symbol: stripped.to_string(),
        instrument: InstrumentType::Option,
        strike: Some(strike),
        expiry_ns: Some(expiry_ns),
        option_type: Some(option_type),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let info = parse_option_symbol("BTC-30AUG24-50000-C").unwrap();
        assert_eq!(info.symbol, "BTC-30AUG24-50000-C");
        assert_eq!(info.instrument, InstrumentType::Option);
        assert_eq!(info.option_type, Some(OptionType::Call));
        assert_eq!(info.strike, Some("50000".parse().unwrap()));

        // 2024-08-30T00:00:00Z
        assert_eq!(info.expiry_ns, Some(1_724_976_000_000_000_000));
    }

    #[test]
    fn test_parse_put_with_usdt_suffix() {
        let info = parse_option_symbol("ETH-1JAN25-4000-P-USDT").unwrap();
        assert_eq!(info.symbol, "ETH-1JAN25-4000-P");
        assert_eq!(info.option_type, Some(OptionType::Put));
    }

    #[test]
    fn test_rejects_non_options() {
        assert!(parse_option_symbol("BTCUSDT").is_none());
        assert!(parse_option_symbol("BTC-30AUG24-50000-X").is_none());
        assert!(parse_option_symbol("BTC-FOO-50000-C").is_none());
        assert!(parse_option_symbol("BTC-30AUG24-0-C").is_none());
        assert!(parse_option_symbol("BTC-30AUG24-abc-C").is_none());
    }
}
