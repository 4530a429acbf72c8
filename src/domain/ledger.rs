//! Cash-flow ledger and funding records.
//!
//! Raw ledger updates carry a `delta` payload tagged by `type`. Only the four kinds that
//! move capital in or out of the account are modelled; everything else (vault
//! operations, spot/perp class transfers, liquidation notices) is left to the caller's
//! fetch layer and skipped here.

use crate::domain::parse::{decimal_field, optional_decimal_field, str_field, time_field};
use crate::domain::{Address, Coin, Decimal, ParseError, TimeMs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of capital movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowKind {
    Deposit,
    Withdraw,
    Send,
    SubAccountTransfer,
}

impl CashFlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashFlowKind::Deposit => "deposit",
            CashFlowKind::Withdraw => "withdraw",
            CashFlowKind::Send => "send",
            CashFlowKind::SubAccountTransfer => "sub_account_transfer",
        }
    }

    /// Transfers move funds between exchange accounts rather than on/off the exchange.
    pub fn is_transfer(&self) -> bool {
        matches!(self, CashFlowKind::Send | CashFlowKind::SubAccountTransfer)
    }
}

impl std::fmt::Display for CashFlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded ledger payload, one variant per capital-moving kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDelta {
    Deposit {
        usdc: Decimal,
    },
    Withdraw {
        usdc: Decimal,
        fee: Decimal,
    },
    Send {
        source: String,
        destination: String,
        amount: Decimal,
    },
    SubAccountTransfer {
        source: String,
        destination: String,
        usdc: Decimal,
    },
}

impl LedgerDelta {
    /// Decode a `delta` object. Returns `Ok(None)` for kinds that do not move capital.
    pub fn from_json(delta: &Value) -> Result<Option<Self>, ParseError> {
        let kind = str_field(delta, "type")?;
        let parsed = match kind {
            "deposit" => LedgerDelta::Deposit {
                usdc: decimal_field(delta, "usdc")?,
            },
            "withdraw" => LedgerDelta::Withdraw {
                usdc: decimal_field(delta, "usdc")?,
                fee: optional_decimal_field(delta, "fee")?.unwrap_or_default(),
            },
            "send" => LedgerDelta::Send {
                source: str_field(delta, "user")?.to_string(),
                destination: str_field(delta, "destination")?.to_string(),
                // Non-USDC sends report their USD value separately.
                amount: match optional_decimal_field(delta, "usdcValue")? {
                    Some(value) => value,
                    None => decimal_field(delta, "amount")?,
                },
            },
            "subAccountTransfer" => LedgerDelta::SubAccountTransfer {
                source: str_field(delta, "user")?.to_string(),
                destination: str_field(delta, "destination")?.to_string(),
                usdc: decimal_field(delta, "usdc")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    pub fn kind(&self) -> CashFlowKind {
        match self {
            LedgerDelta::Deposit { .. } => CashFlowKind::Deposit,
            LedgerDelta::Withdraw { .. } => CashFlowKind::Withdraw,
            LedgerDelta::Send { .. } => CashFlowKind::Send,
            LedgerDelta::SubAccountTransfer { .. } => CashFlowKind::SubAccountTransfer,
        }
    }

    /// Signed amount relative to `target`, plus the counterparty for transfers.
    ///
    /// Returns `None` for self-transfers and transfers in which `target` is neither side.
    pub fn resolve(&self, target: &Address) -> Option<(Decimal, Option<Address>)> {
        match self {
            LedgerDelta::Deposit { usdc } => Some((usdc.abs(), None)),
            LedgerDelta::Withdraw { usdc, fee } => Some((-(usdc.abs() + fee.abs()), None)),
            LedgerDelta::Send {
                source,
                destination,
                amount,
            } => resolve_transfer(target, source, destination, *amount),
            LedgerDelta::SubAccountTransfer {
                source,
                destination,
                usdc,
            } => resolve_transfer(target, source, destination, *usdc),
        }
    }
}

fn resolve_transfer(
    target: &Address,
    source: &str,
    destination: &str,
    amount: Decimal,
) -> Option<(Decimal, Option<Address>)> {
    if source.eq_ignore_ascii_case(destination) {
        return None;
    }
    let counterparty = |raw: &str| Address::parse(raw).unwrap_or_else(|_| Address::new(raw.into()));
    if target.matches(destination) {
        Some((amount.abs(), Some(counterparty(source))))
    } else if target.matches(source) {
        Some((-amount.abs(), Some(counterparty(destination))))
    } else {
        None
    }
}

/// A raw ledger update: envelope plus decoded delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub time_ms: TimeMs,
    pub tx_hash: Option<String>,
    pub delta: LedgerDelta,
}

impl LedgerUpdate {
    /// Decode a `userNonFundingLedgerUpdates` record.
    ///
    /// Returns `Ok(None)` when the record is well-formed but not a capital movement.
    pub fn from_json(json: &Value) -> Result<Option<Self>, ParseError> {
        if !json.is_object() {
            return Err(ParseError::NotAnObject);
        }
        let time_ms = time_field(json, "time")?;
        let delta = json.get("delta").ok_or(ParseError::MissingField("delta"))?;
        let tx_hash = normalize_tx_hash(json.get("hash").and_then(|v| v.as_str()));
        Ok(LedgerDelta::from_json(delta)?.map(|delta| LedgerUpdate {
            time_ms,
            tx_hash,
            delta,
        }))
    }
}

/// A cash movement resolved against the target address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Dedup key: (time, tx hash, kind). A digest of the amount stands in for a missing hash.
    pub event_key: String,
    pub time_ms: TimeMs,
    pub kind: CashFlowKind,
    /// Signed amount: positive inflow, negative outflow.
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl LedgerEvent {
    /// Create a new LedgerEvent and compute its `event_key`.
    pub fn new(
        time_ms: TimeMs,
        kind: CashFlowKind,
        amount: Decimal,
        counterparty: Option<Address>,
        tx_hash: Option<String>,
    ) -> Self {
        let tx_hash = normalize_tx_hash(tx_hash.as_deref());
        let event_key = Self::compute_event_key(time_ms, kind, &amount, tx_hash.as_deref());
        Self {
            event_key,
            time_ms,
            kind,
            amount,
            counterparty,
            tx_hash,
        }
    }

    /// Resolve a decoded update against `target`; `None` if it does not touch the target.
    pub fn from_update(update: LedgerUpdate, target: &Address) -> Option<Self> {
        let kind = update.delta.kind();
        let (amount, counterparty) = update.delta.resolve(target)?;
        Some(Self::new(
            update.time_ms,
            kind,
            amount,
            counterparty,
            update.tx_hash,
        ))
    }

    /// Compute the dedup key for this event.
    ///
    /// When `tx_hash` is unavailable, a SHA-256 digest of the amount truncated to 128 bits
    /// keeps distinct same-millisecond events apart.
    pub fn compute_event_key(
        time_ms: TimeMs,
        kind: CashFlowKind,
        amount: &Decimal,
        tx_hash: Option<&str>,
    ) -> String {
        if let Some(tx) = tx_hash {
            return format!("{}:{}:{}", time_ms.as_ms(), tx, kind);
        }

        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(kind.as_str());
        hasher.update(time_ms.as_ms().to_le_bytes());
        hasher.update(amount.to_canonical_string());
        let digest = hasher.finalize();
        format!("{}:hash:{}:{}", time_ms.as_ms(), hex::encode(&digest[..16]), kind)
    }

    pub fn is_inflow(&self) -> bool {
        self.amount.is_positive()
    }
}

/// Lowercase, trimmed hash; empty and all-zero hashes count as missing.
fn normalize_tx_hash(tx_hash: Option<&str>) -> Option<String> {
    tx_hash
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| !s.trim_start_matches("0x").chars().all(|c| c == '0'))
}

/// A funding payment (positive) or charge (negative) on a perpetual position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRecord {
    pub time_ms: TimeMs,
    pub coin: Coin,
    pub amount: Decimal,
}

impl FundingRecord {
    pub fn new(time_ms: TimeMs, coin: Coin, amount: Decimal) -> Self {
        Self {
            time_ms,
            coin,
            amount,
        }
    }

    /// Decode a `userFunding` record, nested (`delta`) or flat.
    pub fn from_json(json: &Value) -> Result<Self, ParseError> {
        if !json.is_object() {
            return Err(ParseError::NotAnObject);
        }
        let time_ms = time_field(json, "time")?;
        let body = json.get("delta").unwrap_or(json);
        let coin = str_field(body, "coin")?;
        let amount = decimal_field(body, "usdc")?;
        Ok(Self::new(time_ms, Coin::new(coin.to_string()), amount))
    }

    pub fn dedupe_key(&self) -> (TimeMs, Coin) {
        (self.time_ms, self.coin.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TARGET: &str = "0x1111111111111111111111111111111111111111";
    const OTHER: &str = "0x2222222222222222222222222222222222222222";

    fn target() -> Address {
        Address::parse(TARGET).unwrap()
    }

    fn resolve(record: Value) -> Option<LedgerEvent> {
        let update = LedgerUpdate::from_json(&record).unwrap()?;
        LedgerEvent::from_update(update, &target())
    }

    #[test]
    fn deposit_is_always_inflow() {
        let event = resolve(json!({
            "time": 1, "hash": "0xaa",
            "delta": {"type": "deposit", "usdc": "-250.5"}
        }))
        .unwrap();
        assert_eq!(event.kind, CashFlowKind::Deposit);
        assert_eq!(event.amount, Decimal::from_str_canonical("250.5").unwrap());
        assert!(event.is_inflow());
    }

    #[test]
    fn withdraw_is_outflow_including_fee() {
        let event = resolve(json!({
            "time": 1, "hash": "0xbb",
            "delta": {"type": "withdraw", "usdc": "100", "fee": "1", "nonce": 5}
        }))
        .unwrap();
        assert_eq!(event.amount, Decimal::from(-101));
    }

    #[test]
    fn send_sign_depends_on_target_side() {
        let incoming = resolve(json!({
            "time": 1, "hash": "0xcc",
            "delta": {"type": "send", "user": OTHER, "destination": TARGET.to_uppercase().replace("0X", "0x"), "amount": "10", "token": "USDC"}
        }))
        .unwrap();
        assert_eq!(incoming.amount, Decimal::from(10));
        assert_eq!(incoming.counterparty, Some(Address::parse(OTHER).unwrap()));

        let outgoing = resolve(json!({
            "time": 1, "hash": "0xcd",
            "delta": {"type": "send", "user": TARGET, "destination": OTHER, "amount": "10", "usdcValue": "12"}
        }))
        .unwrap();
        assert_eq!(outgoing.amount, Decimal::from(-12));
    }

    #[test]
    fn self_and_unrelated_transfers_are_ignored() {
        assert!(resolve(json!({
            "time": 1,
            "delta": {"type": "subAccountTransfer", "user": TARGET, "destination": TARGET, "usdc": "5"}
        }))
        .is_none());

        assert!(resolve(json!({
            "time": 1,
            "delta": {"type": "subAccountTransfer", "user": OTHER, "destination": "0x3333333333333333333333333333333333333333", "usdc": "5"}
        }))
        .is_none());
    }

    #[test]
    fn non_capital_kinds_decode_to_none() {
        let record = json!({"time": 1, "delta": {"type": "accountClassTransfer", "usdc": "5", "toPerp": true}});
        assert_eq!(LedgerUpdate::from_json(&record).unwrap(), None);
    }

    #[test]
    fn malformed_records_error() {
        assert_eq!(
            LedgerUpdate::from_json(&json!({"delta": {"type": "deposit", "usdc": "1"}})),
            Err(ParseError::MissingField("time"))
        );
        assert_eq!(
            LedgerUpdate::from_json(&json!({"time": 1, "delta": {"type": "deposit"}})),
            Err(ParseError::MissingField("usdc"))
        );
    }

    #[test]
    fn event_key_uses_hash_time_and_kind() {
        let event = LedgerEvent::new(
            TimeMs::new(5),
            CashFlowKind::Deposit,
            Decimal::from(1),
            None,
            Some(" 0xABC ".to_string()),
        );
        assert_eq!(event.event_key, "5:0xabc:deposit");
    }

    #[test]
    fn zero_hash_counts_as_missing() {
        let a = LedgerEvent::new(
            TimeMs::new(5),
            CashFlowKind::Deposit,
            Decimal::from(1),
            None,
            Some("0x0000000000000000".to_string()),
        );
        let b = LedgerEvent::new(
            TimeMs::new(5),
            CashFlowKind::Deposit,
            Decimal::from(2),
            None,
            Some("0x0000000000000000".to_string()),
        );
        assert_eq!(a.tx_hash, None);
        assert_ne!(a.event_key, b.event_key);
    }

    #[test]
    fn funding_accepts_nested_and_flat() {
        let nested = FundingRecord::from_json(&json!({
            "time": 10, "hash": "0x0",
            "delta": {"type": "funding", "coin": "BTC", "usdc": "-1.5", "szi": "0.1", "fundingRate": "0.0001"}
        }))
        .unwrap();
        let flat =
            FundingRecord::from_json(&json!({"time": 10, "coin": "BTC", "usdc": "-1.5"})).unwrap();
        assert_eq!(nested, flat);
        assert_eq!(nested.amount, Decimal::from_str_canonical("-1.5").unwrap());
    }
}
