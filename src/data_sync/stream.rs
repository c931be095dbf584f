use crate::error::MalformedMessageError;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Pairs with a known ticker stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum TokenPair {
    BnbUsdt,
}

/// A numeric field as it appears on the wire: either a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn to_f64(&self, field: &'static str) -> Result<f64, MalformedMessageError> {
        let value = match self {
            RawNumber::Number(n) => *n,
            RawNumber::Text(s) => s.trim().parse::<f64>().map_err(|_| MalformedMessageError::NonNumeric {
                field,
                value: s.clone(),
            })?,
        };

        if !value.is_finite() {
            return Err(MalformedMessageError::NonNumeric { field, value: value.to_string() });
        }
        Ok(value)
    }

    fn to_i64(&self, field: &'static str) -> Result<i64, MalformedMessageError> {
        match self {
            RawNumber::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i64),
            RawNumber::Number(n) => Err(MalformedMessageError::NonInteger { field, value: n.to_string() }),
            RawNumber::Text(s) => s.trim().parse::<i64>().map_err(|_| MalformedMessageError::NonInteger {
                field,
                value: s.clone(),
            }),
        }
    }
}

/// 24h rolling window ticker frame (`<symbol>@ticker`).
///
/// Field names follow the exchange's compact single-letter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: RawNumber,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price_change: RawNumber,
    #[serde(rename = "P")]
    pub price_change_percent: RawNumber,
    #[serde(rename = "w")]
    pub weighted_average_price: RawNumber,
    #[serde(rename = "x")]
    pub first_trade_price: RawNumber,
    #[serde(rename = "c")]
    pub last_price: RawNumber,
    #[serde(rename = "Q")]
    pub last_quantity: RawNumber,
    #[serde(rename = "b")]
    pub best_bid_price: RawNumber,
    #[serde(rename = "B")]
    pub best_bid_quantity: RawNumber,
    #[serde(rename = "a")]
    pub best_ask_price: RawNumber,
    #[serde(rename = "A")]
    pub best_ask_quantity: RawNumber,
    #[serde(rename = "o")]
    pub open_price: RawNumber,
    #[serde(rename = "h")]
    pub high_price: RawNumber,
    #[serde(rename = "l")]
    pub low_price: RawNumber,
    #[serde(rename = "v")]
    pub total_traded_base_asset_volume: RawNumber,
    #[serde(rename = "q")]
    pub total_traded_quote_asset_volume: RawNumber,
    #[serde(rename = "O")]
    pub statistics_open_time: RawNumber,
    #[serde(rename = "C")]
    pub statistics_close_time: RawNumber,
    #[serde(rename = "F")]
    pub first_trade_id: RawNumber,
    #[serde(rename = "L")]
    pub last_trade_id: RawNumber,
    #[serde(rename = "n")]
    pub total_number_of_trades: RawNumber,
}

/// Combined-stream frames wrap the payload as `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamFrame {
    Combined {
        #[allow(dead_code)]
        stream: String,
        data: RawTick,
    },
    Raw(RawTick),
}

/// Typed ticker update with descriptive field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTick {
    pub event_type: String,
    pub event_time: i64,
    pub symbol: String,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub weighted_average_price: f64,
    pub first_trade_price: f64,
    pub last_price: f64,
    pub last_quantity: f64,
    pub best_bid_price: f64,
    pub best_bid_quantity: f64,
    pub best_ask_price: f64,
    pub best_ask_quantity: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub total_traded_base_asset_volume: f64,
    pub total_traded_quote_asset_volume: f64,
    pub statistics_open_time: i64,
    pub statistics_close_time: i64,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    pub total_number_of_trades: i64,
}

impl TryFrom<RawTick> for NormalizedTick {
    type Error = MalformedMessageError;

    fn try_from(raw: RawTick) -> Result<Self, Self::Error> {
        Ok(Self {
            event_time: raw.event_time.to_i64("E")?,
            price_change: raw.price_change.to_f64("p")?,
            price_change_percent: raw.price_change_percent.to_f64("P")?,
            weighted_average_price: raw.weighted_average_price.to_f64("w")?,
            first_trade_price: raw.first_trade_price.to_f64("x")?,
            last_price: raw.last_price.to_f64("c")?,
            last_quantity: raw.last_quantity.to_f64("Q")?,
            best_bid_price: raw.best_bid_price.to_f64("b")?,
            best_bid_quantity: raw.best_bid_quantity.to_f64("B")?,
            best_ask_price: raw.best_ask_price.to_f64("a")?,
            best_ask_quantity: raw.best_ask_quantity.to_f64("A")?,
            open_price: raw.open_price.to_f64("o")?,
            high_price: raw.high_price.to_f64("h")?,
            low_price: raw.low_price.to_f64("l")?,
            total_traded_base_asset_volume: raw.total_traded_base_asset_volume.to_f64("v")?,
            total_traded_quote_asset_volume: raw.total_traded_quote_asset_volume.to_f64("q")?,
            statistics_open_time: raw.statistics_open_time.to_i64("O")?,
            statistics_close_time: raw.statistics_close_time.to_i64("C")?,
            first_trade_id: raw.first_trade_id.to_i64("F")?,
            last_trade_id: raw.last_trade_id.to_i64("L")?,
            total_number_of_trades: raw.total_number_of_trades.to_i64("n")?,
            event_type: raw.event_type,
            symbol: raw.symbol,
        })
    }
}

/// Parse one text frame from the ticker stream.
///
/// Any parse or coercion failure yields [`MalformedMessageError`]; nothing is partially
/// produced, so callers can drop the frame and keep their previous state.
pub fn parse_frame(text: &str) -> Result<NormalizedTick, MalformedMessageError> {
    let raw = match serde_json::from_str::<StreamFrame>(text)? {
        StreamFrame::Combined { data, .. } => data,
        StreamFrame::Raw(raw) => raw,
    };
    NormalizedTick::try_from(raw)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    pub(crate) fn sample_frame(last_price: &str) -> String {
        serde_json::json!({
            "e": "24hrTicker",
            "E": 1_620_000_000_123u64,
            "s": "BNBUSDT",
            "p": "-12.50000000",
            "P": "-2.150",
            "w": "575.31200000",
            "x": "581.20000000",
            "c": last_price,
            "Q": "0.42000000",
            "b": "568.60000000",
            "B": "11.30000000",
            "a": "568.80000000",
            "A": "3.05000000",
            "o": "581.20000000",
            "h": "590.00000000",
            "l": "560.10000000",
            "v": "1234567.89000000",
            "q": "710203040.12000000",
            "O": 1_619_913_600_123u64,
            "C": 1_620_000_000_123u64,
            "F": 100,
            "L": 200,
            "n": 101
        })
        .to_string()
    }

    #[test]
    fn test_parse_frame_coerces_numeric_strings() {
        let tick = parse_frame(&sample_frame("568.70000000")).unwrap();

        assert_eq!(tick.event_type, "24hrTicker");
        assert_eq!(tick.symbol, "BNBUSDT");
        assert_eq!(tick.event_time, 1_620_000_000_123);
        assert_eq!(tick.last_price, 568.7);
        assert_eq!(tick.price_change, -12.5);
        assert_eq!(tick.price_change_percent, -2.15);
        assert_eq!(tick.first_trade_price, 581.2);
        assert_eq!(tick.total_traded_quote_asset_volume, 710_203_040.12);
        assert_eq!(tick.first_trade_id, 100);
        assert_eq!(tick.last_trade_id, 200);
        assert_eq!(tick.total_number_of_trades, 101);
    }

    #[test]
    fn test_numeric_fields_match_source_text() {
        let tick = parse_frame(&sample_frame("0.00012345")).unwrap();
        let formatted = tick.last_price.to_string();
        assert!((formatted.parse::<f64>().unwrap() - 0.00012345).abs() < f64::EPSILON);
        assert!((tick.best_ask_quantity - 3.05).abs() < 1e-12);
    }

    #[test]
    fn test_numbers_accepted_where_strings_expected() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_frame("1.0")).unwrap();
        value["c"] = serde_json::json!(612.25);
        value["n"] = serde_json::json!("77");

        let tick = parse_frame(&value.to_string()).unwrap();
        assert_eq!(tick.last_price, 612.25);
        assert_eq!(tick.total_number_of_trades, 77);
    }

    #[test]
    fn test_combined_stream_envelope() {
        let text = format!(r#"{{"stream":"bnbusdt@ticker","data":{}}}"#, sample_frame("570.1"));
        let tick = parse_frame(&text).unwrap();
        assert_eq!(tick.last_price, 570.1);
    }

    #[test]
    fn test_non_numeric_field_is_malformed() {
        let err = parse_frame(&sample_frame("not-a-price")).unwrap_err();
        assert!(matches!(err, MalformedMessageError::NonNumeric { field: "c", .. }));
    }

    #[test]
    fn test_non_finite_field_is_malformed() {
        let err = parse_frame(&sample_frame("NaN")).unwrap_err();
        assert!(matches!(err, MalformedMessageError::NonNumeric { field: "c", .. }));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_frame("1.0")).unwrap();
        value.as_object_mut().unwrap().remove("b");

        assert!(matches!(parse_frame(&value.to_string()), Err(MalformedMessageError::Json(_))));
        assert!(parse_frame("{not json").is_err());
    }

    #[test]
    fn test_fractional_trade_id_is_malformed() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_frame("1.0")).unwrap();
        value["L"] = serde_json::json!(200.5);

        let err = parse_frame(&value.to_string()).unwrap_err();
        assert!(matches!(err, MalformedMessageError::NonInteger { field: "L", .. }));
    }

    #[test]
    fn test_token_pair_symbol() {
        assert_eq!(TokenPair::BnbUsdt.as_ref(), "bnbusdt");
        assert_eq!(TokenPair::from_str("bnbusdt").unwrap(), TokenPair::BnbUsdt);
    }
}
