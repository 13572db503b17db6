//! Append-only ledger store
//!
//! Keeps the movement history in its own database, deliberately not
//! coordinated with the balance store in any cross-store transaction. The
//! idempotency key is the only join between the two. Writes are idempotent
//! per (key, account) so a redelivery that follows a partial failure
//! converges instead of duplicating entries.

pub mod error;
pub mod models;
pub mod store;

pub use error::{LedgerError, Result};
pub use models::LedgerEntry;
pub use store::LedgerStore;
