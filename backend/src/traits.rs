//! Session and ledger boundary traits.

use std::future::Future;
use std::sync::Arc;

use accrue_types::{Pool, SessionId, TokenAmount, Transaction};

use crate::wire::{ActiveSession, BalanceSnapshot, SendReceipt};
use crate::BackendError;

/// Backend mining-session authority.
pub trait SessionBackend: Send + Sync {
    /// Open a new session and return its id.
    fn create_session(&self) -> impl Future<Output = Result<SessionId, BackendError>> + Send;

    fn terminate_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// The session the backend currently considers running, if any.
    fn get_active_session(
        &self,
    ) -> impl Future<Output = Result<Option<ActiveSession>, BackendError>> + Send;

    /// Current mining rate in tokens per hour.
    fn get_mining_rate(&self) -> impl Future<Output = Result<f64, BackendError>> + Send;
}

/// Backend ledger authority.
pub trait LedgerBackend: Send + Sync {
    fn get_balance(&self) -> impl Future<Output = Result<BalanceSnapshot, BackendError>> + Send;

    /// Move `amount` between pools as one operation; returns the new balance.
    fn exchange(
        &self,
        amount: TokenAmount,
        from: Pool,
        to: Pool,
    ) -> impl Future<Output = Result<BalanceSnapshot, BackendError>> + Send;

    fn send(
        &self,
        target: &str,
        amount: TokenAmount,
        note: Option<&str>,
    ) -> impl Future<Output = Result<SendReceipt, BackendError>> + Send;

    /// One page of backend transaction history, newest first. Pages start at 1.
    fn list_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Transaction>, BackendError>> + Send;
}

impl<T: SessionBackend> SessionBackend for Arc<T> {
    fn create_session(&self) -> impl Future<Output = Result<SessionId, BackendError>> + Send {
        (**self).create_session()
    }

    fn terminate_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        (**self).terminate_session(session_id)
    }

    fn get_active_session(
        &self,
    ) -> impl Future<Output = Result<Option<ActiveSession>, BackendError>> + Send {
        (**self).get_active_session()
    }

    fn get_mining_rate(&self) -> impl Future<Output = Result<f64, BackendError>> + Send {
        (**self).get_mining_rate()
    }
}

impl<T: LedgerBackend> LedgerBackend for Arc<T> {
    fn get_balance(&self) -> impl Future<Output = Result<BalanceSnapshot, BackendError>> + Send {
        (**self).get_balance()
    }

    fn exchange(
        &self,
        amount: TokenAmount,
        from: Pool,
        to: Pool,
    ) -> impl Future<Output = Result<BalanceSnapshot, BackendError>> + Send {
        (**self).exchange(amount, from, to)
    }

    fn send(
        &self,
        target: &str,
        amount: TokenAmount,
        note: Option<&str>,
    ) -> impl Future<Output = Result<SendReceipt, BackendError>> + Send {
        (**self).send(target, amount, note)
    }

    fn list_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Transaction>, BackendError>> + Send {
        (**self).list_transactions(page, page_size)
    }
}
