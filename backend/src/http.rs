//! HTTP client implementing the backend boundary over JSON.
//!
//! Endpoint layout:
//!
//! | Operation | Request |
//! |---|---|
//! | create session | `POST /mining/sessions` |
//! | terminate session | `POST /mining/sessions/{id}/terminate` |
//! | active session | `GET /mining/sessions/active` |
//! | mining rate | `GET /mining/rate` |
//! | balance | `GET /wallet/balance` |
//! | exchange | `POST /wallet/exchange` |
//! | send | `POST /wallet/send` |
//! | history | `GET /wallet/transactions?page=&page_size=` |

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use accrue_types::{Pool, SessionId, TokenAmount, Transaction};

use crate::traits::{LedgerBackend, SessionBackend};
use crate::wire::{ActiveSession, BalanceSnapshot, SendReceipt, WireTransaction};
use crate::BackendError;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the mining and wallet API.
///
/// Wraps `reqwest::Client` with the API base URL and bearer token.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: SessionId,
}

#[derive(Deserialize)]
struct ActiveSessionResponse {
    #[serde(default)]
    session: Option<ActiveSession>,
}

#[derive(Deserialize)]
struct RateResponse {
    rate: f64,
}

#[derive(Serialize)]
struct ExchangeRequest {
    amount: f64,
    from: Pool,
    to: Pool,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    target: &'a str,
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    transaction: WireTransaction,
    recipient: String,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<WireTransaction>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl HttpBackend {
    /// Create a client targeting `base_url` (e.g. `https://api.example.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<ErrorBody> = response.json().await.ok();
            return Err(classify_status(status, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Send a request whose success body is ignored.
    async fn call_empty(&self, builder: RequestBuilder) -> Result<(), BackendError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<ErrorBody> = response.json().await.ok();
            return Err(classify_status(status, body));
        }
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Network(format!("request timed out: {e}"))
    } else if e.is_connect() {
        BackendError::Network(format!("connection failed: {e}"))
    } else if e.is_decode() {
        BackendError::InvalidResponse(e.to_string())
    } else {
        BackendError::Network(e.to_string())
    }
}

/// Map a non-success status (and optional error body) to a typed error.
fn classify_status(status: StatusCode, body: Option<ErrorBody>) -> BackendError {
    let (message, code) = match body {
        Some(b) => (b.error.unwrap_or_default(), b.code),
        None => (String::new(), None),
    };
    if code.as_deref() == Some("insufficient_funds") || status == StatusCode::PAYMENT_REQUIRED {
        return BackendError::InsufficientFunds(message);
    }
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let message = if message.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            message
        };
        return BackendError::Rejected(message);
    }
    BackendError::Http {
        status: status.as_u16(),
        message,
    }
}

fn to_wire_amount(amount: TokenAmount) -> f64 {
    amount.as_tokens()
}

impl SessionBackend for HttpBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        let resp: CreateSessionResponse = self
            .call(self.http.post(self.url("mining/sessions")))
            .await?;
        Ok(resp.session_id)
    }

    async fn terminate_session(&self, session_id: &SessionId) -> Result<(), BackendError> {
        let path = format!("mining/sessions/{}/terminate", session_id.as_str());
        self.call_empty(self.http.post(self.url(&path))).await
    }

    async fn get_active_session(&self) -> Result<Option<ActiveSession>, BackendError> {
        let resp: ActiveSessionResponse = self
            .call(self.http.get(self.url("mining/sessions/active")))
            .await?;
        Ok(resp.session)
    }

    async fn get_mining_rate(&self) -> Result<f64, BackendError> {
        let resp: RateResponse = self.call(self.http.get(self.url("mining/rate"))).await?;
        checked_rate(resp.rate)
    }
}

impl LedgerBackend for HttpBackend {
    async fn get_balance(&self) -> Result<BalanceSnapshot, BackendError> {
        self.call(self.http.get(self.url("wallet/balance"))).await
    }

    async fn exchange(
        &self,
        amount: TokenAmount,
        from: Pool,
        to: Pool,
    ) -> Result<BalanceSnapshot, BackendError> {
        let body = ExchangeRequest {
            amount: to_wire_amount(amount),
            from,
            to,
        };
        self.call(self.http.post(self.url("wallet/exchange")).json(&body))
            .await
    }

    async fn send(
        &self,
        target: &str,
        amount: TokenAmount,
        note: Option<&str>,
    ) -> Result<SendReceipt, BackendError> {
        let body = SendRequest {
            target,
            amount: to_wire_amount(amount),
            note,
        };
        let resp: SendResponse = self
            .call(self.http.post(self.url("wallet/send")).json(&body))
            .await?;
        let transaction = resp
            .transaction
            .into_transaction()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(SendReceipt {
            transaction,
            recipient: resp.recipient,
        })
    }

    async fn list_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, BackendError> {
        let request = self
            .http
            .get(self.url("wallet/transactions"))
            .query(&[("page", page), ("page_size", page_size)]);
        let resp: TransactionsResponse = self.call(request).await?;
        resp.transactions
            .into_iter()
            .map(|w| {
                w.into_transaction()
                    .map_err(|e| BackendError::InvalidResponse(e.to_string()))
            })
            .collect()
    }
}

/// A mining rate must be a positive, finite number of tokens per hour.
fn checked_rate(rate: f64) -> Result<f64, BackendError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(BackendError::InvalidResponse(format!(
            "invalid mining rate {rate}"
        )));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> HttpBackend {
        HttpBackend::new(url, None, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let b = backend("http://127.0.0.1:8080/api/");
        assert_eq!(b.url("/mining/rate"), "http://127.0.0.1:8080/api/mining/rate");
    }

    #[test]
    fn non_positive_rate_is_invalid_response() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                checked_rate(rate),
                Err(BackendError::InvalidResponse(_))
            ));
        }
        assert_eq!(checked_rate(0.125), Ok(0.125));
    }

    #[test]
    fn payment_required_maps_to_insufficient_funds() {
        let err = classify_status(StatusCode::PAYMENT_REQUIRED, None);
        assert!(matches!(err, BackendError::InsufficientFunds(_)));
    }

    #[test]
    fn insufficient_funds_code_wins_over_status() {
        let body = ErrorBody {
            error: Some("balance too low".into()),
            code: Some("insufficient_funds".into()),
        };
        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, Some(body));
        assert_eq!(err, BackendError::InsufficientFunds("balance too low".into()));
    }

    #[test]
    fn client_errors_are_rejections_server_errors_are_transient() {
        let rejected = classify_status(StatusCode::CONFLICT, None);
        assert!(matches!(rejected, BackendError::Rejected(_)));
        assert!(!rejected.is_transient());

        let server = classify_status(StatusCode::BAD_GATEWAY, None);
        assert!(server.is_transient());

        let throttled = classify_status(StatusCode::TOO_MANY_REQUESTS, None);
        assert!(throttled.is_transient());
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let b = backend("http://127.0.0.1:9");
        let err = b.get_mining_rate().await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err:?}");
    }
}
