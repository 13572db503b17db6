//! Message bus for the transaction pipeline, on NATS JetStream
//!
//! Provides the transport layer between intake and the workers:
//! - one durable stream for queued transactions, at-least-once delivery
//! - explicit acknowledgement, negative-ack with requeue, terminal reject
//! - a dead-letter stream for permanently rejected deliveries
//! - retry logic with exponential backoff on publish
//! - observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod dlq;
pub mod error;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

pub use client::{NatsClient, NatsConfig};
pub use dlq::{DlqEntry, DlqRouter};
pub use error::{Error, Result};
pub use message::{classify, ClassifyError, QueuedOp, TransferMessage, TxMessage};
pub use publisher::{Publisher, PublisherConfig};
pub use subscriber::{Subscriber, SubscriberConfig};

/// Durable stream holding queued transactions
pub const TX_STREAM: &str = "LEDGER_TX";

/// Subject both message shapes are published on
pub const TX_SUBJECT: &str = "ledger.tx";

/// Durable stream holding dead-lettered deliveries
pub const DLQ_STREAM: &str = "LEDGER_DLQ";

/// Subject prefix for dead-letter entries
pub const DLQ_SUBJECT_PREFIX: &str = "ledger.dlq";
