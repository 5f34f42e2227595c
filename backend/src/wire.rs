//! Values that cross the backend boundary.

use serde::{Deserialize, Serialize};

use accrue_types::{
    ExchangeLeg, Pool, SessionId, Timestamp, TokenAmount, Transaction, TransactionKind,
    TypesError, WalletBalance,
};

/// A session the backend considers running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: SessionId,
    /// Tokens per hour.
    pub rate: f64,
    pub started_at: Timestamp,
}

/// Balance as reported by the ledger, in decimal tokens.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub total: f64,
    pub sendable: f64,
    #[serde(alias = "nonSendable")]
    pub non_sendable: f64,
    pub pending: f64,
}

impl BalanceSnapshot {
    /// Snapshot whose `total` is the sum of the parts.
    pub fn from_parts(sendable: f64, non_sendable: f64, pending: f64) -> Self {
        Self {
            total: sendable + non_sendable + pending,
            sendable,
            non_sendable,
            pending,
        }
    }

    /// Convert to the local balance. The reported `total` is not trusted;
    /// the local total is always recomputed from the parts.
    pub fn to_balance(&self) -> Result<WalletBalance, TypesError> {
        let balance = WalletBalance::from_tokens(self.sendable, self.non_sendable, self.pending)?;
        let computed = balance.total().as_tokens();
        if (computed - self.total).abs() > 1e-6 {
            tracing::warn!(
                reported = self.total,
                computed,
                "backend total disagrees with sum of pools; using sum"
            );
        }
        Ok(balance)
    }
}

impl From<WalletBalance> for BalanceSnapshot {
    fn from(balance: WalletBalance) -> Self {
        Self {
            total: balance.total().as_tokens(),
            sendable: balance.sendable().as_tokens(),
            non_sendable: balance.non_sendable().as_tokens(),
            pending: balance.pending().as_tokens(),
        }
    }
}

/// Result of a successful send.
#[derive(Clone, Debug, PartialEq)]
pub struct SendReceipt {
    pub transaction: Transaction,
    pub recipient: String,
}

/// JSON shape of a ledger transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct WireTransaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub from: Option<Pool>,
    #[serde(default)]
    pub to: Option<Pool>,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

impl WireTransaction {
    pub(crate) fn into_transaction(self) -> Result<Transaction, TypesError> {
        let exchange = match (self.from, self.to) {
            (Some(from), Some(to)) => Some(ExchangeLeg { from, to }),
            _ => None,
        };
        Ok(Transaction {
            id: self.id,
            kind: self.kind,
            amount: TokenAmount::from_tokens(self.amount)?,
            counterparty: self.counterparty,
            note: self.note,
            exchange,
            timestamp: Timestamp::new(self.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_total_recomputed_from_parts() {
        let snapshot = BalanceSnapshot {
            total: 999.0,
            sendable: 1.0,
            non_sendable: 2.0,
            pending: 3.0,
        };
        let balance = snapshot.to_balance().unwrap();
        assert_eq!(balance.total(), TokenAmount::whole(6));
    }

    #[test]
    fn snapshot_rejects_negative_pool() {
        let snapshot = BalanceSnapshot::from_parts(-1.0, 0.0, 0.0);
        assert!(snapshot.to_balance().is_err());
    }

    #[test]
    fn snapshot_accepts_camel_case() {
        let json = r#"{"total": 3.0, "sendable": 1.0, "nonSendable": 2.0, "pending": 0.0}"#;
        let snapshot: BalanceSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.non_sendable, 2.0);
    }

    #[test]
    fn wire_exchange_transaction_gets_leg() {
        let json = r#"{"id":"t1","kind":"exchange","amount":2.5,"from":"non_sendable","to":"sendable","timestamp":1000}"#;
        let wire: WireTransaction = serde_json::from_str(json).unwrap();
        let tx = wire.into_transaction().unwrap();
        assert_eq!(tx.amount, TokenAmount::from_tokens(2.5).unwrap());
        assert_eq!(
            tx.exchange,
            Some(ExchangeLeg {
                from: Pool::NonSendable,
                to: Pool::Sendable
            })
        );
    }
}
