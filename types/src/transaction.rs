//! Append-only balance event history.
//!
//! Transactions are an audit trail only. Balances come from the backend
//! ledger and are never derived by summing this log.

use serde::{Deserialize, Serialize};

use crate::{Pool, TokenAmount, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Send,
    Receive,
    MiningCredit,
    Exchange,
}

/// Source and destination pool of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLeg {
    pub from: Pool,
    pub to: Pool,
}

/// A single balance-affecting event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: TokenAmount,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub exchange: Option<ExchangeLeg>,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn exchange(id: impl Into<String>, amount: TokenAmount, leg: ExchangeLeg, at: Timestamp) -> Self {
        Self {
            id: id.into(),
            kind: TransactionKind::Exchange,
            amount,
            counterparty: None,
            note: None,
            exchange: Some(leg),
            timestamp: at,
        }
    }
}

/// Ordered, append-only list of transactions.
///
/// There is deliberately no removal or mutable access.
#[derive(Clone, Debug, Default)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, tx: Transaction) {
        self.entries.push(tx);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries, oldest first.
    pub fn to_vec(&self) -> Vec<Transaction> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut log = TransactionLog::new();
        let leg = ExchangeLeg {
            from: Pool::NonSendable,
            to: Pool::Sendable,
        };
        log.append(Transaction::exchange("a", TokenAmount::whole(1), leg, Timestamp::new(1)));
        log.append(Transaction::exchange("b", TokenAmount::whole(2), leg, Timestamp::new(2)));
        let entries = log.to_vec();
        let ids: Vec<_> = entries.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(entries[1].amount, TokenAmount::whole(2));
        assert_eq!(log.len(), 2);
    }
}
