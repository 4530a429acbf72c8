//! Fill type representing a single trade execution.

use crate::domain::parse::{decimal_field, str_field, time_field, ParseError};
use crate::domain::{Coin, Decimal, Side, TimeMs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single trade fill/execution, already scoped to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Stable unique identifier for this fill.
    pub fill_key: String,
    /// Time of the fill in milliseconds since Unix epoch.
    pub time_ms: TimeMs,
    /// Coin/asset being traded.
    pub coin: Coin,
    /// Trade side (Buy or Sell).
    pub side: Side,
    /// Price per unit.
    pub px: Decimal,
    /// Size/quantity traded.
    pub sz: Decimal,
    /// Fee paid for this fill.
    pub fee: Decimal,
    /// Closed PnL booked by this fill (zero for opens).
    pub closed_pnl: Decimal,
    /// Whether the fill was part of a liquidation.
    pub liquidation: bool,
    /// Transaction hash. Several fills of one order may share it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Trade ID (preferred stable key).
    pub tid: Option<i64>,
}

impl Fill {
    /// Create a new Fill.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time_ms: TimeMs,
        coin: Coin,
        side: Side,
        px: Decimal,
        sz: Decimal,
        fee: Decimal,
        closed_pnl: Decimal,
        liquidation: bool,
        hash: Option<String>,
        tid: Option<i64>,
    ) -> Self {
        let fill_key = Self::compute_fill_key(
            &coin,
            time_ms,
            side,
            &px,
            &sz,
            &closed_pnl,
            hash.as_deref(),
            tid,
        );
        Fill {
            fill_key,
            time_ms,
            coin,
            side,
            px,
            sz,
            fee,
            closed_pnl,
            liquidation,
            hash,
            tid,
        }
    }

    /// Decode a fill from a Hyperliquid `userFills` record.
    pub fn from_json(json: &Value) -> Result<Self, ParseError> {
        if !json.is_object() {
            return Err(ParseError::NotAnObject);
        }
        let time_ms = time_field(json, "time")?;
        let coin = str_field(json, "coin")?;
        let side_code = str_field(json, "side")?;
        let side =
            Side::from_code(side_code).ok_or_else(|| ParseError::InvalidSide(side_code.into()))?;
        let px = decimal_field(json, "px")?;
        let sz = decimal_field(json, "sz")?;
        let fee = decimal_field(json, "fee")?;
        let closed_pnl = decimal_field(json, "closedPnl")?;

        // Liquidation fills carry a `liquidation` object; archived rows use a bool.
        let liquidation = match json.get("liquidation") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => true,
        };
        let hash = json.get("hash").and_then(|v| v.as_str()).map(str::to_string);
        let tid = json.get("tid").and_then(|v| v.as_i64());

        Ok(Fill::new(
            time_ms,
            Coin::new(coin.to_string()),
            side,
            px,
            sz,
            fee,
            closed_pnl,
            liquidation,
            hash,
            tid,
        ))
    }

    /// Generate a stable unique key for this fill.
    ///
    /// Priority: `tid` (if present) > hash of deterministic fields. The tx hash alone is
    /// not unique because one order can produce many fills in the same transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_fill_key(
        coin: &Coin,
        time_ms: TimeMs,
        side: Side,
        px: &Decimal,
        sz: &Decimal,
        closed_pnl: &Decimal,
        hash: Option<&str>,
        tid: Option<i64>,
    ) -> String {
        if let Some(tid) = tid {
            return format!("tid:{}", tid);
        }

        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(coin.as_str());
        hasher.update(time_ms.as_ms().to_le_bytes());
        hasher.update(if side == Side::Buy { b"B" } else { b"A" });
        hasher.update(px.to_canonical_string());
        hasher.update(sz.to_canonical_string());
        hasher.update(closed_pnl.to_canonical_string());
        if let Some(hash) = hash {
            hasher.update(hash.to_ascii_lowercase());
        }
        let digest = hasher.finalize();
        format!("hash:{}", hex::encode(&digest[..16]))
    }

    /// Borrow the precomputed fill key.
    pub fn fill_key(&self) -> &str {
        &self.fill_key
    }

    /// Traded notional (`px * sz`), saturating at the decimal range.
    pub fn notional(&self) -> Decimal {
        self.px * self.sz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_fill_key_with_tid() {
        let key = Fill::compute_fill_key(
            &Coin::new("BTC".to_string()),
            TimeMs::new(1000),
            Side::Buy,
            &d("50000"),
            &d("1.5"),
            &d("0"),
            Some("0xabc"),
            Some(12345),
        );
        assert_eq!(key, "tid:12345");
    }

    #[test]
    fn test_fill_key_without_tid_uses_hash() {
        let key = Fill::compute_fill_key(
            &Coin::new("BTC".to_string()),
            TimeMs::new(1000),
            Side::Buy,
            &d("50000"),
            &d("1.5"),
            &d("0"),
            None,
            None,
        );
        assert!(key.starts_with("hash:"));
        assert_eq!(key.len(), 5 + 32);
    }

    #[test]
    fn test_fill_key_distinguishes_px() {
        let coin = Coin::new("BTC".to_string());
        let a = Fill::compute_fill_key(
            &coin,
            TimeMs::new(1000),
            Side::Buy,
            &d("100"),
            &d("1"),
            &d("0"),
            None,
            None,
        );
        let b = Fill::compute_fill_key(
            &coin,
            TimeMs::new(1000),
            Side::Buy,
            &d("101"),
            &d("1"),
            &d("0"),
            None,
            None,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_json_valid() {
        let record = json!({
            "time": 1000,
            "coin": "ETH",
            "side": "A",
            "px": "2500.5",
            "sz": "2",
            "fee": "1.2",
            "closedPnl": "-40.5",
            "hash": "0xdead",
            "tid": 77
        });

        let fill = Fill::from_json(&record).unwrap();
        assert_eq!(fill.time_ms, TimeMs::new(1000));
        assert_eq!(fill.coin.as_str(), "ETH");
        assert_eq!(fill.side, Side::Sell);
        assert_eq!(fill.closed_pnl, d("-40.5"));
        assert_eq!(fill.notional(), d("5001"));
        assert!(!fill.liquidation);
        assert_eq!(fill.fill_key(), "tid:77");
    }

    #[test]
    fn test_from_json_liquidation_object() {
        let record = json!({
            "time": 1000,
            "coin": "BTC",
            "side": "B",
            "px": "1",
            "sz": "1",
            "fee": "0",
            "closedPnl": "-5",
            "liquidation": {"liquidatedUser": "0x1", "markPx": "1", "method": "market"}
        });
        assert!(Fill::from_json(&record).unwrap().liquidation);
    }

    #[test]
    fn test_from_json_missing_fields() {
        let record = json!({"coin": "BTC", "side": "B", "px": "1", "sz": "1"});
        assert_eq!(
            Fill::from_json(&record),
            Err(ParseError::MissingField("time"))
        );

        let record = json!({
            "time": 1, "coin": "BTC", "side": "Z", "px": "1", "sz": "1",
            "fee": "0", "closedPnl": "0"
        });
        assert_eq!(
            Fill::from_json(&record),
            Err(ParseError::InvalidSide("Z".to_string()))
        );

        assert_eq!(Fill::from_json(&json!(5)), Err(ParseError::NotAnObject));
    }
}
