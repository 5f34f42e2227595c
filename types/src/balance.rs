//! Three-way wallet balance partition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TokenAmount, TypesError};

/// One of the two exchangeable balance pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    /// Immediately transferable to other users.
    Sendable,
    /// Mining rewards; must be exchanged before they can be sent.
    NonSendable,
}

impl Pool {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Sendable => Self::NonSendable,
            Self::NonSendable => Self::Sendable,
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sendable => f.write_str("sendable"),
            Self::NonSendable => f.write_str("non_sendable"),
        }
    }
}

/// Wallet balance split across sendable, non-sendable and pending pools.
///
/// The total is always derived from the parts; there is no stored total that
/// could drift. Every mutation produces a whole new value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    sendable: TokenAmount,
    non_sendable: TokenAmount,
    pending: TokenAmount,
}

impl WalletBalance {
    pub const ZERO: Self = Self {
        sendable: TokenAmount::ZERO,
        non_sendable: TokenAmount::ZERO,
        pending: TokenAmount::ZERO,
    };

    /// Build a balance, rejecting partitions whose sum overflows.
    pub fn new(
        sendable: TokenAmount,
        non_sendable: TokenAmount,
        pending: TokenAmount,
    ) -> Result<Self, TypesError> {
        sendable
            .checked_add(non_sendable)
            .and_then(|s| s.checked_add(pending))
            .ok_or(TypesError::Overflow)?;
        Ok(Self {
            sendable,
            non_sendable,
            pending,
        })
    }

    /// Build a balance from decimal token values (wire representation).
    pub fn from_tokens(sendable: f64, non_sendable: f64, pending: f64) -> Result<Self, TypesError> {
        Self::new(
            TokenAmount::from_tokens(sendable)?,
            TokenAmount::from_tokens(non_sendable)?,
            TokenAmount::from_tokens(pending)?,
        )
    }

    pub fn sendable(&self) -> TokenAmount {
        self.sendable
    }

    pub fn non_sendable(&self) -> TokenAmount {
        self.non_sendable
    }

    pub fn pending(&self) -> TokenAmount {
        self.pending
    }

    /// `sendable + non_sendable + pending`.
    pub fn total(&self) -> TokenAmount {
        self.sendable + self.non_sendable + self.pending
    }

    pub fn pool(&self, pool: Pool) -> TokenAmount {
        match pool {
            Pool::Sendable => self.sendable,
            Pool::NonSendable => self.non_sendable,
        }
    }

    /// A copy with `amount` added to the non-sendable pool.
    pub fn with_non_sendable_credit(&self, amount: TokenAmount) -> Result<Self, TypesError> {
        let non_sendable = self
            .non_sendable
            .checked_add(amount)
            .ok_or(TypesError::Overflow)?;
        Self::new(self.sendable, non_sendable, self.pending)
    }

    /// A copy with `amount` removed from the sendable pool, or `None` if the
    /// pool is too small.
    pub fn with_sendable_debit(&self, amount: TokenAmount) -> Option<Self> {
        let sendable = self.sendable.checked_sub(amount)?;
        Some(Self {
            sendable,
            ..*self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_parts() {
        let balance =
            WalletBalance::new(TokenAmount::whole(3), TokenAmount::whole(4), TokenAmount::whole(5))
                .unwrap();
        assert_eq!(balance.total(), TokenAmount::whole(12));
    }

    #[test]
    fn debit_refuses_overdraw() {
        let balance =
            WalletBalance::new(TokenAmount::whole(3), TokenAmount::ZERO, TokenAmount::ZERO).unwrap();
        assert!(balance.with_sendable_debit(TokenAmount::whole(4)).is_none());
        let after = balance.with_sendable_debit(TokenAmount::whole(1)).unwrap();
        assert_eq!(after.sendable(), TokenAmount::whole(2));
        assert_eq!(after.total(), TokenAmount::whole(2));
    }

    #[test]
    fn credit_lands_in_non_sendable() {
        let after = WalletBalance::ZERO
            .with_non_sendable_credit(TokenAmount::whole(7))
            .unwrap();
        assert_eq!(after.non_sendable(), TokenAmount::whole(7));
        assert_eq!(after.sendable(), TokenAmount::ZERO);
    }

    #[test]
    fn overflowing_partition_rejected() {
        let max = TokenAmount::new(u128::MAX);
        assert_eq!(
            WalletBalance::new(max, TokenAmount::new(1), TokenAmount::ZERO),
            Err(TypesError::Overflow)
        );
    }
}
