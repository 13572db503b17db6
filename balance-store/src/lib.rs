//! Authoritative balance store
//!
//! Owns the `accounts` table and the `processed_messages` registry that
//! makes every applied operation durable and unique. All balance mutations
//! happen here, inside a single database transaction holding the account
//! row lock(s); the registry probe at the head of each apply makes
//! redelivery and duplicate submission converge on the replay path.

pub mod error;
pub mod models;
pub mod store;

pub use error::{Result, StoreError};
pub use models::Account;
pub use store::BalanceStore;
