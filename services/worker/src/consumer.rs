// Consumer loop - drains the transaction stream and applies each delivery
// exactly once in effect: balance mutation in the balance store, matching
// entry in the ledger store, then settle the delivery.

use async_nats::jetstream::{self, Message};
use balance_store::{BalanceStore, StoreError};
use futures::StreamExt;
use ledger_store::LedgerStore;
use message_bus::{
    classify, DlqRouter, QueuedOp, Subscriber, TransferMessage, TxMessage,
};
use message_bus::metrics::{MESSAGE_PROCESS_DURATION, MESSAGE_RECEIVE_TOTAL};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Terminal disposition of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Applied and recorded; delete the delivery
    Ack,

    /// Transient failure; redeliver later
    Requeue,

    /// Permanent failure; dead-letter, then stop redelivering
    DeadLetter(String),
}

pub struct Consumer {
    balances: Arc<BalanceStore>,
    ledger: Arc<LedgerStore>,
    dlq: Arc<DlqRouter>,
    shutdown: CancellationToken,
}

impl Consumer {
    pub fn new(
        balances: Arc<BalanceStore>,
        ledger: Arc<LedgerStore>,
        dlq: Arc<DlqRouter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            balances,
            ledger,
            dlq,
            shutdown,
        }
    }

    /// Drain deliveries until the stream ends or shutdown is requested.
    /// The in-flight delivery is always settled before returning, so a
    /// graceful drain never abandons a message mid-application.
    pub async fn run(&self, subscriber: &Subscriber) -> message_bus::Result<()> {
        let mut messages = subscriber.messages().await?;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested, consumer stopping");
                    return Ok(());
                }
                next = messages.next() => {
                    let Some(delivery) = next else {
                        warn!("message stream ended");
                        return Ok(());
                    };
                    match delivery {
                        Ok(message) => self.settle(message).await,
                        Err(e) => error!("error receiving delivery: {}", e),
                    }
                }
            }
        }
    }

    /// Process one delivery and settle it. Every delivery exits in exactly
    /// one of {acked, requeued, dead-lettered}.
    async fn settle(&self, message: Message) {
        let start = Instant::now();
        let (shape, outcome) = self.process(&message).await;

        match &outcome {
            Outcome::Ack => {
                if let Err(e) = message.ack().await {
                    error!("failed to ack delivery: {}", e);
                }
            }
            Outcome::Requeue => {
                if let Err(e) = message.ack_with(jetstream::AckKind::Nak(None)).await {
                    error!("failed to nak delivery: {}", e);
                }
            }
            Outcome::DeadLetter(reason) => {
                let deliveries = message.info().map(|info| info.delivered).unwrap_or(1);
                match self.dlq.route(&message.payload, reason, deliveries).await {
                    Ok(entry_id) => {
                        info!(%entry_id, "delivery dead-lettered: {}", reason);
                        if let Err(e) = message.ack_with(jetstream::AckKind::Term).await {
                            error!("failed to terminate delivery: {}", e);
                        }
                    }
                    Err(e) => {
                        // The delivery stays alive until the DLQ record
                        // exists; redelivery retries the whole protocol.
                        error!("failed to route delivery to DLQ, requeueing: {}", e);
                        if let Err(e) = message.ack_with(jetstream::AckKind::Nak(None)).await {
                            error!("failed to nak delivery: {}", e);
                        }
                    }
                }
            }
        }

        MESSAGE_PROCESS_DURATION
            .with_label_values(&[shape])
            .observe(start.elapsed().as_secs_f64());
        MESSAGE_RECEIVE_TOTAL
            .with_label_values(&[shape, outcome_label(&outcome)])
            .inc();
    }

    async fn process(&self, message: &Message) -> (&'static str, Outcome) {
        match classify(&message.payload) {
            Ok(QueuedOp::Transaction(tx)) => ("transaction", self.apply_transaction(&tx).await),
            Ok(QueuedOp::Transfer(transfer)) => ("transfer", self.apply_transfer(&transfer).await),
            Err(e) => {
                warn!("rejecting unclassifiable payload: {}", e);
                ("unknown", Outcome::DeadLetter(e.to_string()))
            }
        }
    }

    async fn apply_transaction(&self, message: &TxMessage) -> Outcome {
        let balance_after = match self
            .balances
            .apply_transaction(
                message.account_id,
                &message.kind,
                message.amount,
                &message.idempotency_key,
            )
            .await
        {
            Ok(balance) => balance,
            Err(e) => return store_outcome(e),
        };

        if let Err(e) = self
            .ledger
            .append(
                message.account_id,
                &message.kind,
                signed_amount(&message.kind, message.amount),
                balance_after,
                &message.idempotency_key,
                message.created_at,
            )
            .await
        {
            // The redelivery takes the replay path in the balance store
            // and retries this write with the same balance-after.
            warn!(key = %message.idempotency_key, "ledger append failed, requeueing: {}", e);
            return Outcome::Requeue;
        }

        info!(
            account = %message.account_id,
            kind = %message.kind,
            amount = message.amount,
            balance_after,
            key = %message.idempotency_key,
            "transaction applied"
        );
        Outcome::Ack
    }

    async fn apply_transfer(&self, message: &TransferMessage) -> Outcome {
        let (from_after, to_after) = match self
            .balances
            .apply_transfer(
                message.from_account_id,
                message.to_account_id,
                message.amount,
                &message.idempotency_key,
            )
            .await
        {
            Ok(balances) => balances,
            Err(e) => return store_outcome(e),
        };

        if let Err(e) = self
            .ledger
            .append_transfer(
                message.from_account_id,
                message.to_account_id,
                message.amount,
                from_after,
                to_after,
                &message.idempotency_key,
                message.created_at,
            )
            .await
        {
            warn!(key = %message.idempotency_key, "transfer ledger append failed, requeueing: {}", e);
            return Outcome::Requeue;
        }

        info!(
            from = %message.from_account_id,
            to = %message.to_account_id,
            amount = message.amount,
            from_after,
            to_after,
            key = %message.idempotency_key,
            "transfer applied"
        );
        Outcome::Ack
    }
}

/// Map a balance-store failure to a delivery disposition. A client retry
/// of a permanent failure would fail identically, so those deliveries go
/// to the dead-letter stream instead of looping.
fn store_outcome(err: StoreError) -> Outcome {
    if err.is_permanent() {
        Outcome::DeadLetter(err.to_string())
    } else {
        Outcome::Requeue
    }
}

/// Ledger entries carry signed amounts; the sign encodes direction
fn signed_amount(kind: &str, amount: i64) -> i64 {
    match kind {
        "withdraw" => -amount,
        _ => amount,
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Ack => "acked",
        Outcome::Requeue => "requeued",
        Outcome::DeadLetter(_) => "dead_lettered",
    }
}
