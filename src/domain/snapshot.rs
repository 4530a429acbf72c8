//! Point-in-time account state decoded from Hyperliquid's `clearinghouseState`.

use crate::domain::parse::{decimal_field, optional_decimal_field, str_field};
use crate::domain::{Coin, Decimal, ParseError, TimeMs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One open perpetual position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub coin: Coin,
    /// Signed size: positive long, negative short.
    pub size: Decimal,
    pub entry_px: Option<Decimal>,
    pub position_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Decimal,
}

/// Latest known account state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Time the snapshot was taken; `None` means "now".
    pub time_ms: Option<TimeMs>,
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    pub total_ntl_pos: Decimal,
    pub withdrawable: Decimal,
    pub positions: Vec<PositionSnapshot>,
}

impl AccountSnapshot {
    pub fn new(account_value: Decimal, time_ms: Option<TimeMs>) -> Self {
        Self {
            time_ms,
            account_value,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: PositionSnapshot) -> Self {
        self.positions.push(position);
        self
    }

    /// Sum of unrealized PnL across open positions.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.unrealized_pnl).sum()
    }

    /// Decode a `clearinghouseState` response.
    ///
    /// The response's own `time` wins over `fallback_time` when present. Zero-size
    /// positions are dropped.
    pub fn from_clearinghouse_state(
        json: &Value,
        fallback_time: Option<TimeMs>,
    ) -> Result<Self, ParseError> {
        let margin_summary = json
            .get("marginSummary")
            .ok_or(ParseError::MissingField("marginSummary"))?;

        let account_value = decimal_field(margin_summary, "accountValue")?;
        let total_margin_used =
            optional_decimal_field(margin_summary, "totalMarginUsed")?.unwrap_or_default();
        let total_ntl_pos =
            optional_decimal_field(margin_summary, "totalNtlPos")?.unwrap_or_default();
        let withdrawable = optional_decimal_field(json, "withdrawable")?
            .or(optional_decimal_field(margin_summary, "withdrawable")?)
            .unwrap_or_default();

        let time_ms = json
            .get("time")
            .and_then(|v| v.as_i64())
            .map(TimeMs::new)
            .or(fallback_time);

        let mut positions = Vec::new();
        if let Some(asset_positions) = json.get("assetPositions").and_then(|v| v.as_array()) {
            for asset_pos in asset_positions {
                let Some(position) = asset_pos.get("position") else {
                    continue;
                };

                let size = decimal_field(position, "szi")?;
                if size.is_zero() {
                    continue;
                }

                positions.push(PositionSnapshot {
                    coin: Coin::new(str_field(position, "coin")?.to_string()),
                    size,
                    entry_px: optional_decimal_field(position, "entryPx")?,
                    position_value: optional_decimal_field(position, "positionValue")?
                        .unwrap_or_default(),
                    unrealized_pnl: optional_decimal_field(position, "unrealizedPnl")?
                        .unwrap_or_default(),
                    liquidation_px: optional_decimal_field(position, "liquidationPx")?,
                    margin_used: optional_decimal_field(position, "marginUsed")?
                        .unwrap_or_default(),
                });
            }
        }

        Ok(AccountSnapshot {
            time_ms,
            account_value,
            total_margin_used,
            total_ntl_pos,
            withdrawable,
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clearinghouse_state_empty() {
        let json = serde_json::json!({
            "marginSummary": {
                "accountValue": "10000",
                "totalMarginUsed": "500",
                "totalNtlPos": "5000",
                "totalRawUsd": "10000"
            },
            "withdrawable": "9500",
            "assetPositions": [],
            "time": 1700000000000i64
        });

        let snapshot = AccountSnapshot::from_clearinghouse_state(&json, None).unwrap();
        assert!(snapshot.positions.is_empty());
        assert_eq!(snapshot.account_value, Decimal::from(10000));
        assert_eq!(snapshot.withdrawable, Decimal::from(9500));
        assert_eq!(snapshot.time_ms, Some(TimeMs::new(1700000000000)));
        assert!(snapshot.unrealized_pnl().is_zero());
    }

    #[test]
    fn test_parse_clearinghouse_state_with_positions() {
        let json = serde_json::json!({
            "marginSummary": {"accountValue": "10000"},
            "assetPositions": [
                {
                    "position": {
                        "coin": "BTC",
                        "szi": "0.1",
                        "entryPx": "50000",
                        "positionValue": "5000",
                        "unrealizedPnl": "100",
                        "liquidationPx": "45000",
                        "leverage": {"type": "cross", "value": 10},
                        "marginUsed": "500"
                    }
                },
                {
                    "position": {
                        "coin": "ETH",
                        "szi": "-2",
                        "unrealizedPnl": "-40.5"
                    }
                },
                {
                    "position": {"coin": "SOL", "szi": "0.0", "unrealizedPnl": "0"}
                }
            ]
        });

        let snapshot =
            AccountSnapshot::from_clearinghouse_state(&json, Some(TimeMs::new(5))).unwrap();
        assert_eq!(snapshot.positions.len(), 2);
        assert_eq!(snapshot.positions[0].coin.as_str(), "BTC");
        assert_eq!(
            snapshot.positions[0].liquidation_px,
            Some(Decimal::from(45000))
        );
        assert_eq!(snapshot.time_ms, Some(TimeMs::new(5)));
        assert_eq!(
            snapshot.unrealized_pnl(),
            Decimal::from_str_canonical("59.5").unwrap()
        );
    }

    #[test]
    fn test_parse_clearinghouse_state_requires_account_value() {
        let json = serde_json::json!({"marginSummary": {}});
        assert_eq!(
            AccountSnapshot::from_clearinghouse_state(&json, None),
            Err(ParseError::MissingField("accountValue"))
        );
    }
}
