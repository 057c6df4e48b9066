use std::{fmt::Display, time::Duration};

use serde::Serialize;

use crate::{
    db_types::{Order, OrderStatus},
    gateway::TransactionInstructions,
};

/// What set a reconciliation in motion. Recorded against every status change it causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    Webhook,
    ManualCheck,
    Poll,
    PaymentCreation,
    Expiry,
    AdminOverride,
}

impl Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Webhook => "webhook",
            Trigger::ManualCheck => "manual_check",
            Trigger::Poll => "poll",
            Trigger::PaymentCreation => "payment_creation",
            Trigger::Expiry => "expiry",
            Trigger::AdminOverride => "admin_override",
        };
        write!(f, "{s}")
    }
}

/// The result of a successful reconciliation. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// We applied a novel transition and dispatched its notification.
    Updated { order: Order, from: OrderStatus, to: OrderStatus },
    /// The order already had the reported status (or the report was stale). Nothing was written.
    Unchanged { order: Order },
    /// Another writer changed the order between our read and our conditional write. We did nothing; `order` is the
    /// state the winner left behind.
    RaceLost { order: Order },
}

impl ReconcileOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReconcileOutcome::Updated { order, .. } => order,
            ReconcileOutcome::Unchanged { order } => order,
            ReconcileOutcome::RaceLost { order } => order,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.order().status
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, ReconcileOutcome::Updated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    PaymentCreated { order: Order, instructions: TransactionInstructions },
    /// The provider refused a new transaction and a reconciliation pass showed the order is already paid.
    AlreadyPaid { order: Order },
    /// The provider refused a new transaction because the previous one is still waiting for payment.
    AttemptStillActive { order: Order },
}

/// Tallies for one poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub expired: usize,
}

impl Display for PollSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} checked, {} updated, {} unchanged, {} failed, {} expired",
            self.checked, self.updated, self.unchanged, self.failed, self.expired
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationOptions {
    /// Upper bound on every provider call
    pub query_timeout: Duration,
    pub max_payment_attempts: u32,
    /// Orders still `PENDING` this long after creation are cancelled by the poll
    pub payment_expiry: chrono::Duration,
    /// The poll only looks at `PENDING` orders older than this
    pub poll_min_age: chrono::Duration,
    /// How many orders a poll tick reconciles at once
    pub poll_concurrency: usize,
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
            max_payment_attempts: 5,
            payment_expiry: chrono::Duration::hours(24),
            poll_min_age: chrono::Duration::minutes(5),
            poll_concurrency: 8,
        }
    }
}
