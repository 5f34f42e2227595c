//! Nullable backend: an in-memory session authority and ledger.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use accrue_backend::{
    ActiveSession, BackendError, BalanceSnapshot, Clock, LedgerBackend, SendReceipt,
    SessionBackend,
};
use accrue_types::{
    ExchangeLeg, Pool, SessionId, Timestamp, TokenAmount, Transaction, TransactionKind,
    WalletBalance,
};

use crate::NullClock;

/// Identifies a boundary method, for call recording and failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendCall {
    CreateSession,
    TerminateSession,
    GetActiveSession,
    GetMiningRate,
    GetBalance,
    Exchange,
    Send,
    ListTransactions,
}

struct Inner {
    rate: f64,
    active: Option<ActiveSession>,
    balance: WalletBalance,
    next_id: u64,
    queued_failures: HashMap<BackendCall, VecDeque<BackendError>>,
    failing: HashMap<BackendCall, BackendError>,
    calls: Vec<BackendCall>,
    history: Vec<Transaction>,
}

/// A scriptable backend for testing.
///
/// Every call yields to the scheduler once before touching state, so
/// concurrent callers genuinely interleave. Calls are recorded in order.
pub struct NullBackend {
    inner: Mutex<Inner>,
    clock: Option<Arc<NullClock>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rate: 1.0,
                active: None,
                balance: WalletBalance::ZERO,
                next_id: 1,
                queued_failures: HashMap::new(),
                failing: HashMap::new(),
                calls: Vec::new(),
                history: Vec::new(),
            }),
            clock: None,
        }
    }

    /// Stamp created sessions with this clock's time.
    pub fn with_clock(mut self, clock: Arc<NullClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_rate(self, rate: f64) -> Self {
        self.inner.lock().unwrap().rate = rate;
        self
    }

    pub fn with_balance(self, balance: WalletBalance) -> Self {
        self.inner.lock().unwrap().balance = balance;
        self
    }

    pub fn set_rate(&self, rate: f64) {
        self.inner.lock().unwrap().rate = rate;
    }

    pub fn set_balance(&self, balance: WalletBalance) {
        self.inner.lock().unwrap().balance = balance;
    }

    pub fn set_active_session(&self, session: Option<ActiveSession>) {
        self.inner.lock().unwrap().active = session;
    }

    /// Simulate a server-side timeout of the running session.
    pub fn expire_session(&self) {
        self.inner.lock().unwrap().active = None;
    }

    /// Fail the next call of `call` with `error`. Queued failures are
    /// consumed in order before `fail_always` applies.
    pub fn fail_next(&self, call: BackendCall, error: BackendError) {
        self.inner
            .lock()
            .unwrap()
            .queued_failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Fail every call of `call` until [`NullBackend::clear_failures`].
    pub fn fail_always(&self, call: BackendCall, error: BackendError) {
        self.inner.lock().unwrap().failing.insert(call, error);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.queued_failures.clear();
        inner.failing.clear();
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, call: BackendCall) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    /// Distinct calls made so far.
    pub fn called(&self) -> HashSet<BackendCall> {
        self.inner.lock().unwrap().calls.iter().copied().collect()
    }

    pub fn balance(&self) -> WalletBalance {
        self.inner.lock().unwrap().balance
    }

    pub fn active_session(&self) -> Option<ActiveSession> {
        self.inner.lock().unwrap().active.clone()
    }

    /// Add a transaction to the ledger history.
    pub fn push_history(&self, tx: Transaction) {
        self.inner.lock().unwrap().history.push(tx);
    }

    fn now(&self) -> Timestamp {
        self.clock
            .as_ref()
            .map(|c| c.now())
            .unwrap_or(Timestamp::EPOCH)
    }

    /// Record the call and return an injected failure, if any.
    async fn enter(&self, call: BackendCall) -> Result<(), BackendError> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if let Some(err) = inner
            .queued_failures
            .get_mut(&call)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        if let Some(err) = inner.failing.get(&call) {
            return Err(err.clone());
        }
        Ok(())
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for NullBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        self.enter(BackendCall::CreateSession).await?;
        let started_at = self.now();
        let mut inner = self.inner.lock().unwrap();
        let id = SessionId::new(format!("session-{}", inner.next_id));
        inner.next_id += 1;
        inner.active = Some(ActiveSession {
            session_id: id.clone(),
            rate: inner.rate,
            started_at,
        });
        Ok(id)
    }

    async fn terminate_session(&self, session_id: &SessionId) -> Result<(), BackendError> {
        self.enter(BackendCall::TerminateSession).await?;
        let mut inner = self.inner.lock().unwrap();
        if inner
            .active
            .as_ref()
            .is_some_and(|a| &a.session_id == session_id)
        {
            inner.active = None;
        }
        Ok(())
    }

    async fn get_active_session(&self) -> Result<Option<ActiveSession>, BackendError> {
        self.enter(BackendCall::GetActiveSession).await?;
        Ok(self.inner.lock().unwrap().active.clone())
    }

    async fn get_mining_rate(&self) -> Result<f64, BackendError> {
        self.enter(BackendCall::GetMiningRate).await?;
        Ok(self.inner.lock().unwrap().rate)
    }
}

impl LedgerBackend for NullBackend {
    async fn get_balance(&self) -> Result<BalanceSnapshot, BackendError> {
        self.enter(BackendCall::GetBalance).await?;
        Ok(self.inner.lock().unwrap().balance.into())
    }

    async fn exchange(
        &self,
        amount: TokenAmount,
        from: Pool,
        to: Pool,
    ) -> Result<BalanceSnapshot, BackendError> {
        self.enter(BackendCall::Exchange).await?;
        if from == to {
            return Err(BackendError::Rejected("source and destination match".into()));
        }
        let now = self.now();
        let mut inner = self.inner.lock().unwrap();
        let b = inner.balance;
        let available = b.pool(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| BackendError::InsufficientFunds(format!("{from} has {available}")))?;
        let credited = b.pool(to) + amount;
        let (sendable, non_sendable) = match from {
            Pool::Sendable => (remaining, credited),
            Pool::NonSendable => (credited, remaining),
        };
        inner.balance = WalletBalance::new(sendable, non_sendable, b.pending())
            .map_err(|e| BackendError::Rejected(e.to_string()))?;
        let id = format!("tx-{}", inner.history.len() + 1);
        inner.history.push(Transaction::exchange(
            id,
            amount,
            ExchangeLeg { from, to },
            now,
        ));
        Ok(inner.balance.into())
    }

    async fn send(
        &self,
        target: &str,
        amount: TokenAmount,
        note: Option<&str>,
    ) -> Result<SendReceipt, BackendError> {
        self.enter(BackendCall::Send).await?;
        let now = self.now();
        let mut inner = self.inner.lock().unwrap();
        let after = inner.balance.with_sendable_debit(amount).ok_or_else(|| {
            BackendError::InsufficientFunds(format!("sendable is {}", inner.balance.sendable()))
        })?;
        inner.balance = after;
        let transaction = Transaction {
            id: format!("tx-{}", inner.history.len() + 1),
            kind: TransactionKind::Send,
            amount,
            counterparty: Some(target.to_string()),
            note: note.map(str::to_string),
            exchange: None,
            timestamp: now,
        };
        inner.history.push(transaction.clone());
        Ok(SendReceipt {
            transaction,
            recipient: target.to_string(),
        })
    }

    async fn list_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, BackendError> {
        self.enter(BackendCall::ListTransactions).await?;
        let inner = self.inner.lock().unwrap();
        let skip = (page.saturating_sub(1) as usize) * page_size as usize;
        Ok(inner
            .history
            .iter()
            .rev()
            .skip(skip)
            .take(page_size as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_terminate_clears_active() {
        let backend = NullBackend::new();
        let id = backend.create_session().await.unwrap();
        assert_eq!(backend.active_session().unwrap().session_id, id);
        backend.terminate_session(&id).await.unwrap();
        assert!(backend.active_session().is_none());
    }

    #[tokio::test]
    async fn queued_failure_applies_once() {
        let backend = NullBackend::new();
        backend.fail_next(BackendCall::GetMiningRate, BackendError::Network("down".into()));
        assert!(backend.get_mining_rate().await.is_err());
        assert!(backend.get_mining_rate().await.is_ok());
        assert_eq!(backend.call_count(BackendCall::GetMiningRate), 2);
    }

    #[tokio::test]
    async fn exchange_moves_between_pools() {
        let backend = NullBackend::new().with_balance(
            WalletBalance::new(TokenAmount::ZERO, TokenAmount::whole(5), TokenAmount::ZERO).unwrap(),
        );
        let snapshot = backend
            .exchange(TokenAmount::whole(2), Pool::NonSendable, Pool::Sendable)
            .await
            .unwrap();
        assert_eq!(snapshot.sendable, 2.0);
        assert_eq!(snapshot.non_sendable, 3.0);
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let backend = NullBackend::new();
        for i in 0..5u64 {
            backend.push_history(Transaction {
                id: format!("t{i}"),
                kind: TransactionKind::Receive,
                amount: TokenAmount::whole(i),
                counterparty: None,
                note: None,
                exchange: None,
                timestamp: Timestamp::new(i),
            });
        }
        let page: Vec<_> = backend
            .list_transactions(2, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(page, vec!["t2", "t1"]);
    }
}
