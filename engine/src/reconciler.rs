//! Balance reconciler: the three-pool wallet balance kept in step with the
//! backend ledger.
//!
//! Backend results always replace the local balance wholesale. Local changes
//! are made only after the backend confirmed them, except for mining credits,
//! which are optimistic and overwritten by the next refresh.

use accrue_backend::{
    BackendError, BalanceSnapshot, Clock, LedgerBackend, SendReceipt, SessionBackend,
};
use accrue_store::KvStore;
use accrue_types::{
    ExchangeLeg, MiningIntegration, Pool, SessionId, Timestamp, TokenAmount, Transaction,
    TransactionKind, TransactionLog, WalletBalance,
};

use crate::flight::FlightKey;
use crate::{EngineError, MiningEngine};

/// Largest page accepted by [`MiningEngine::list_transactions`].
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default)]
pub struct BalanceReconciler {
    balance: WalletBalance,
    integration: MiningIntegration,
    log: TransactionLog,
}

impl BalanceReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(&mut self, balance: WalletBalance) {
        self.balance = balance;
        self.integration.base_balance = balance.total();
    }

    pub fn balance(&self) -> WalletBalance {
        self.balance
    }

    pub fn integration(&self) -> &MiningIntegration {
        &self.integration
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.log
    }

    /// Replace the local balance with a backend-confirmed one.
    pub fn replace(&mut self, balance: WalletBalance, now: Timestamp) {
        self.balance = balance;
        self.integration.base_balance = balance.total();
        self.integration.last_sync_time = Some(now);
        self.integration.sync_error = None;
    }

    pub fn record_sync_error(&mut self, message: String) {
        self.integration.sync_error = Some(message);
    }

    pub fn set_overlay(&mut self, earnings: f64, active: bool) {
        self.integration.is_mining_active = active;
        self.integration.current_session_earnings = if active { earnings.max(0.0) } else { 0.0 };
    }

    /// Reject an exchange that the source pool cannot cover.
    pub fn check_exchange(&self, amount: TokenAmount, from: Pool) -> Result<(), EngineError> {
        ensure_positive(amount)?;
        let available = self.balance.pool(from);
        if amount > available {
            return Err(EngineError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    pub fn apply_exchange(
        &mut self,
        confirmed: WalletBalance,
        amount: TokenAmount,
        leg: ExchangeLeg,
        now: Timestamp,
    ) {
        self.replace(confirmed, now);
        let id = format!("exchange-{}", self.log.len() + 1);
        self.log.append(Transaction::exchange(id, amount, leg, now));
    }

    /// Optimistically credit mining earnings to the non-sendable pool.
    pub fn add_mining_reward(
        &mut self,
        amount: TokenAmount,
        id: String,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        self.balance = self.balance.with_non_sendable_credit(amount)?;
        self.log.append(Transaction {
            id,
            kind: TransactionKind::MiningCredit,
            amount,
            counterparty: None,
            note: None,
            exchange: None,
            timestamp: now,
        });
        Ok(())
    }

    pub(crate) fn credit_mining(
        &mut self,
        amount: TokenAmount,
        session: &SessionId,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        self.add_mining_reward(amount, format!("mining-{session}"), now)
    }

    pub fn check_send(&self, target: &str, amount: TokenAmount) -> Result<(), EngineError> {
        if target.trim().is_empty() {
            return Err(EngineError::InvalidRequest("recipient must not be empty".into()));
        }
        ensure_positive(amount)?;
        let available = self.balance.sendable();
        if amount > available {
            return Err(EngineError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    pub fn apply_send(&mut self, receipt: SendReceipt, amount: TokenAmount) -> Result<(), EngineError> {
        let available = self.balance.sendable();
        self.balance = self
            .balance
            .with_sendable_debit(amount)
            .ok_or(EngineError::InsufficientBalance {
                needed: amount,
                available,
            })?;
        self.integration.base_balance = self.balance.total();
        self.log.append(receipt.transaction);
        Ok(())
    }
}

fn ensure_positive(amount: TokenAmount) -> Result<(), EngineError> {
    if amount.is_zero() {
        return Err(EngineError::InvalidAmount("amount must be positive".into()));
    }
    Ok(())
}

/// A ledger snapshot whose pools are not valid amounts is a malformed response.
pub(crate) fn ledger_balance(snapshot: &BalanceSnapshot) -> Result<WalletBalance, EngineError> {
    snapshot
        .to_balance()
        .map_err(|e| EngineError::Backend(BackendError::InvalidResponse(e.to_string())))
}

fn parse_amount(amount: f64) -> Result<TokenAmount, EngineError> {
    let parsed =
        TokenAmount::from_tokens(amount).map_err(|e| EngineError::InvalidAmount(e.to_string()))?;
    ensure_positive(parsed)?;
    Ok(parsed)
}

impl<B, S, C> MiningEngine<B, S, C>
where
    B: SessionBackend + LedgerBackend,
    S: KvStore,
    C: Clock,
{
    /// Pull the balance from the ledger and replace the local one.
    ///
    /// On failure the previous balance is kept and the error is recorded on
    /// the integration state as well as returned.
    pub async fn refresh_balance(&self) -> Result<WalletBalance, EngineError> {
        let fetched = self
            .backend
            .get_balance()
            .await
            .map_err(EngineError::from)
            .and_then(|snapshot| ledger_balance(&snapshot));

        let now = self.clock.now();
        let mut state = self.state.write().await;
        match fetched {
            Ok(balance) => {
                state.wallet.replace(balance, now);
                self.persist(&state);
                tracing::debug!(total = %balance.total(), "balance refreshed");
                Ok(balance)
            }
            Err(e) => {
                tracing::warn!("balance refresh failed: {e}");
                state.wallet.record_sync_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Alias of [`MiningEngine::refresh_balance`] used after returning to
    /// the foreground.
    pub async fn sync_balance_with_backend(&self) -> Result<WalletBalance, EngineError> {
        self.refresh_balance().await
    }

    pub async fn exchange_to_sendable(&self, amount: f64) -> Result<WalletBalance, EngineError> {
        self.exchange(amount, Pool::NonSendable).await
    }

    pub async fn exchange_to_non_sendable(&self, amount: f64) -> Result<WalletBalance, EngineError> {
        self.exchange(amount, Pool::Sendable).await
    }

    /// Move `amount` out of `from` into the other pool. Validation happens
    /// before the backend is contacted; the local balance changes only after
    /// the ledger confirmed.
    async fn exchange(&self, amount: f64, from: Pool) -> Result<WalletBalance, EngineError> {
        let amount = parse_amount(amount)?;
        let leg = ExchangeLeg {
            from,
            to: from.opposite(),
        };
        let _flight = self.flights.enter(FlightKey::Ledger).await;

        self.state.read().await.wallet.check_exchange(amount, from)?;

        let snapshot = self.backend.exchange(amount, leg.from, leg.to).await?;
        let confirmed = ledger_balance(&snapshot)?;

        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.wallet.apply_exchange(confirmed, amount, leg, now);
        self.persist(&state);
        tracing::info!(%amount, from = %leg.from, to = %leg.to, "exchange confirmed");
        Ok(confirmed)
    }

    /// Credit `amount` to the non-sendable pool without contacting the
    /// backend. The next refresh overwrites it.
    pub async fn add_mining_reward(&self, amount: f64) -> Result<WalletBalance, EngineError> {
        let amount = parse_amount(amount)?;
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let id = format!("reward-{}", state.wallet.transactions().len() + 1);
        state.wallet.add_mining_reward(amount, id, now)?;
        self.persist(&state);
        Ok(state.wallet.balance())
    }

    pub async fn send_tokens(
        &self,
        target: &str,
        amount: f64,
        note: Option<&str>,
    ) -> Result<Transaction, EngineError> {
        let amount = parse_amount(amount)?;
        let _flight = self.flights.enter(FlightKey::Ledger).await;

        self.state.read().await.wallet.check_send(target, amount)?;

        let receipt = self.backend.send(target, amount, note).await?;
        let transaction = receipt.transaction.clone();

        let mut state = self.state.write().await;
        state.wallet.apply_send(receipt, amount)?;
        self.persist(&state);
        tracing::info!(%amount, recipient = target, "send confirmed");
        Ok(transaction)
    }

    /// One page of backend transaction history, newest first.
    pub async fn list_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, EngineError> {
        if page == 0 {
            return Err(EngineError::InvalidRequest("page starts at 1".into()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(EngineError::InvalidRequest(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self.backend.list_transactions(page, page_size).await?)
    }

    /// Transactions recorded by this engine instance, oldest first.
    pub async fn local_transactions(&self) -> Vec<Transaction> {
        self.state.read().await.wallet.transactions().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(sendable: u64, non_sendable: u64) -> BalanceReconciler {
        let mut reconciler = BalanceReconciler::new();
        reconciler.restore(
            WalletBalance::new(
                TokenAmount::whole(sendable),
                TokenAmount::whole(non_sendable),
                TokenAmount::ZERO,
            )
            .unwrap(),
        );
        reconciler
    }

    #[test]
    fn exchange_checks_source_pool() {
        let reconciler = wallet(0, 5);
        assert!(reconciler
            .check_exchange(TokenAmount::whole(5), Pool::NonSendable)
            .is_ok());
        assert!(matches!(
            reconciler.check_exchange(TokenAmount::whole(10), Pool::NonSendable),
            Err(EngineError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            reconciler.check_exchange(TokenAmount::ZERO, Pool::NonSendable),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn send_requires_recipient_and_funds() {
        let reconciler = wallet(3, 100);
        assert!(matches!(
            reconciler.check_send("  ", TokenAmount::whole(1)),
            Err(EngineError::InvalidRequest(_))
        ));
        assert!(matches!(
            reconciler.check_send("bob", TokenAmount::whole(4)),
            Err(EngineError::InsufficientBalance { .. })
        ));
        assert!(reconciler.check_send("bob", TokenAmount::whole(3)).is_ok());
    }

    #[test]
    fn mining_reward_is_optimistic_until_replace() {
        let mut reconciler = wallet(1, 1);
        reconciler
            .add_mining_reward(TokenAmount::whole(2), "r1".into(), Timestamp::EPOCH)
            .unwrap();
        assert_eq!(reconciler.balance().non_sendable(), TokenAmount::whole(3));
        assert_eq!(reconciler.transactions().len(), 1);

        let confirmed = wallet(1, 1).balance();
        reconciler.replace(confirmed, Timestamp::from_secs(1));
        assert_eq!(reconciler.balance(), confirmed);
        assert_eq!(reconciler.transactions().len(), 1);
    }

    #[test]
    fn overlay_cleared_when_inactive() {
        let mut reconciler = wallet(10, 0);
        reconciler.set_overlay(1.5, true);
        assert_eq!(reconciler.integration().display_balance(), 11.5);
        reconciler.set_overlay(1.5, false);
        assert_eq!(reconciler.integration().display_balance(), 10.0);
    }

    #[test]
    fn sync_error_cleared_by_replace() {
        let mut reconciler = wallet(0, 0);
        reconciler.record_sync_error("offline".into());
        assert!(reconciler.integration().sync_error.is_some());
        reconciler.replace(WalletBalance::ZERO, Timestamp::EPOCH);
        assert!(reconciler.integration().sync_error.is_none());
    }
}
