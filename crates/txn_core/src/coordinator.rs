//! Transaction coordinator.
//!
//! Whether a token is live is derived from store presence alone; nothing is
//! cached in process. Every action performs at most one store write.
//!
//! Two concurrent calls on the same token are not serialized here: the
//! outcome is whatever the store's per-key write atomicity gives, so one full
//! payload wins and the two are never merged.

use crate::error::{ClientError, TxnError};
use crate::ttl::TtlPolicy;
use crate::types::{TxnAction, TxnRequest, TxnResponse};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use txn_ids::{TokenGenerator, TxnToken, UuidTokenGenerator};
use txn_store::TtlStore;

/// Issues, resumes and closes transaction tokens.
#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn TtlStore>,
    tokens: Arc<dyn TokenGenerator>,
    ttl: TtlPolicy,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn TtlStore>, tokens: Arc<dyn TokenGenerator>, ttl: TtlPolicy) -> Self {
        Self { store, tokens, ttl }
    }

    /// Coordinator with `txn:` UUID tokens and the default TTL policy.
    pub fn with_store(store: Arc<dyn TtlStore>) -> Self {
        Self::new(store, Arc::new(UuidTokenGenerator::new()), TtlPolicy::default())
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    /// Handle a request, folding every failure into an error response.
    pub async fn handle(&self, request: TxnRequest) -> TxnResponse {
        let token = request.supplied_token().map(str::to_string);
        let action = request.action;

        match self.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    TxnError::Client(e) => debug!("Rejected {} request: {}", action, e),
                    TxnError::Infrastructure { .. } => error!("Error handling transaction: {}", err),
                }
                TxnResponse::from_error(token.as_deref(), &err)
            }
        }
    }

    /// Handle raw JSON arguments. Shape errors become client error responses.
    pub async fn handle_value(&self, args: Value) -> TxnResponse {
        match serde_json::from_value::<TxnRequest>(args.clone()) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let token = args
                    .get("token")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty());
                let err = TxnError::from(ClientError::InvalidParams(e.to_string()));
                debug!("Rejected malformed transaction request: {}", err);
                TxnResponse::from_error(token, &err)
            }
        }
    }

    /// Apply one action.
    pub async fn execute(&self, request: TxnRequest) -> Result<TxnResponse, TxnError> {
        let ttl_seconds = self.ttl.clamp(request.ttl_seconds);

        match request.action {
            TxnAction::Start => {
                if request.supplied_token().is_some() {
                    return Err(ClientError::TokenForbidden.into());
                }
                self.start(request.payload, ttl_seconds).await
            }
            TxnAction::Resume => {
                let raw = require_token(&request)?;
                // Keys outside the namespace can never name a live transaction.
                let token = TxnToken::parse(raw, self.tokens.prefix())
                    .map_err(|_| ClientError::NotFound(raw.to_string()))?;
                self.resume(token, request.payload, ttl_seconds).await
            }
            TxnAction::Close => {
                let raw = require_token(&request)?;
                match TxnToken::parse(raw, self.tokens.prefix()) {
                    Ok(token) => self.close(token).await,
                    Err(e) => {
                        warn!("Ignoring close of token outside the namespace: {}", e);
                        Ok(TxnResponse::closed(raw))
                    }
                }
            }
        }
    }

    async fn start(&self, payload: Option<Value>, ttl_seconds: u64) -> Result<TxnResponse, TxnError> {
        let token = self.tokens.generate();
        let payload = payload.unwrap_or_else(|| Value::Object(Default::default()));

        self.store
            .set_with_ttl(token.as_str(), &payload, ttl_seconds)
            .await
            .map_err(|e| TxnError::infrastructure(TxnAction::Start, e))?;

        info!("Started transaction {} (ttl {}s)", token, ttl_seconds);
        Ok(TxnResponse::pending(
            token.into_string(),
            payload,
            expiry_after(ttl_seconds),
        ))
    }

    async fn resume(
        &self,
        token: TxnToken,
        payload: Option<Value>,
        ttl_seconds: u64,
    ) -> Result<TxnResponse, TxnError> {
        let current = self
            .store
            .get(token.as_str())
            .await
            .map_err(|e| TxnError::infrastructure(TxnAction::Resume, e))?
            .ok_or_else(|| ClientError::NotFound(token.to_string()))?;

        let payload = match payload {
            Some(replacement) => {
                self.store
                    .set_with_ttl(token.as_str(), &replacement, ttl_seconds)
                    .await
                    .map_err(|e| TxnError::infrastructure(TxnAction::Resume, e))?;
                debug!("Replaced payload of {} (ttl {}s)", token, ttl_seconds);
                replacement
            }
            None => {
                let refreshed = self
                    .store
                    .refresh_ttl(token.as_str(), ttl_seconds)
                    .await
                    .map_err(|e| TxnError::infrastructure(TxnAction::Resume, e))?;
                if !refreshed {
                    // Expired between the read and the refresh.
                    return Err(ClientError::NotFound(token.to_string()).into());
                }
                debug!("Extended {} (ttl {}s)", token, ttl_seconds);
                current
            }
        };

        Ok(TxnResponse::pending(
            token.into_string(),
            payload,
            expiry_after(ttl_seconds),
        ))
    }

    async fn close(&self, token: TxnToken) -> Result<TxnResponse, TxnError> {
        let deleted = self
            .store
            .delete(token.as_str())
            .await
            .map_err(|e| TxnError::infrastructure(TxnAction::Close, e))?;

        if deleted == 0 {
            warn!(
                "Attempted to close non-existent or already closed token: {}",
                token
            );
        } else {
            info!("Closed transaction {}", token);
        }

        Ok(TxnResponse::closed(token.into_string()))
    }
}

fn require_token(request: &TxnRequest) -> Result<&str, ClientError> {
    request
        .supplied_token()
        .ok_or(ClientError::TokenRequired(request.action))
}

fn expiry_after(ttl_seconds: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
