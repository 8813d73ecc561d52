//! Ephemeral transaction token service.
//!
//! A [`TransactionCoordinator`] issues opaque tokens naming caller-supplied
//! state, keeps that state in a [`txn_store::TtlStore`], and lets callers
//! resume or close the transaction by token.
//!
//! ```text
//! start  (no token)        -> pending, new token, payload stored with TTL
//! resume (token, payload?) -> pending, payload replaced or TTL refreshed
//! close  (token)           -> closed, record deleted (idempotent)
//! ```
//!
//! All durable state lives in the store; the coordinator is stateless and
//! can be shared across tasks or replicated across processes.

pub mod coordinator;
pub mod error;
pub mod ttl;
pub mod types;

pub use coordinator::TransactionCoordinator;
pub use error::{ClientError, ErrorKind, InvalidTtlPolicy, TxnError};
pub use ttl::{TtlPolicy, DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS};
pub use types::{TxnAction, TxnRequest, TxnResponse, TxnStatus, UNKNOWN_TOKEN};
