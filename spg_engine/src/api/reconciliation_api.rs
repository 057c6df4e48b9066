use std::fmt::Debug;

use chrono::Utc;
use futures_util::{stream, StreamExt};
use log::*;

use crate::{
    api::{
        errors::ReconciliationError,
        notification_api::NotificationDispatcher,
        reconcile_objects::{PaymentOutcome, PollSummary, ReconcileOutcome, ReconciliationOptions, Trigger},
    },
    db_types::{Identity, NewPaymentAttempt, Order, OrderNumber, OrderStatus, PaymentMethod, StatusChange},
    gateway::{map_provider_status, GatewayError, PaymentGateway, StatusMapping, TransactionStatus},
    order_locks::OrderLocks,
    state_machine::{decide, Decision},
    traits::{NotificationStore, OrderStore},
};

/// `ReconciliationApi` is the single authority that turns "somebody believes this order's payment state changed" into
/// a persisted order update.
///
/// Every entry point funnels into the same critical section, serialized per order:
/// 1. fresh read of the order,
/// 2. the provider status (from the webhook, or a bounded `query_status` call),
/// 3. mapping onto an order status,
/// 4. [`decide`],
/// 5. a compare-and-set write conditioned on the status read in step 1,
/// 6. exactly one notification, only if our write won.
///
/// Applying the same provider status any number of times, from any trigger, gives the same final status and at most
/// one notification.
#[derive(Clone)]
pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: G,
    notifications: NotificationDispatcher<B>,
    locks: OrderLocks,
    options: ReconciliationOptions,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.options)
    }
}

enum PollResult {
    Updated,
    Unchanged,
    Expired,
    Failed,
}

impl<B, G> ReconciliationApi<B, G> {
    pub fn new(db: B, gateway: G, notifications: NotificationDispatcher<B>, options: ReconciliationOptions) -> Self {
        Self { db, gateway, notifications, locks: OrderLocks::new(), options }
    }

    pub fn options(&self) -> &ReconciliationOptions {
        &self.options
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: OrderStore + NotificationStore,
    G: PaymentGateway,
{
    /// Handles a provider callback. The signature over the raw body is checked before anything else; an invalid
    /// signature changes nothing.
    pub async fn process_webhook(&self, body: &[u8], signature: &str) -> Result<ReconcileOutcome, ReconciliationError> {
        if !self.gateway.verify_callback(body, signature) {
            warn!("🪝️ Rejected a webhook with an invalid signature ({} bytes). No state was changed.", body.len());
            return Err(ReconciliationError::GatewaySignatureInvalid);
        }
        let report =
            self.gateway.parse_callback(body).map_err(|e| ReconciliationError::InvalidWebhookPayload(e.to_string()))?;
        info!("🪝️ Provider reports {} for order {} (ref {})", report.status, report.order_number, report.reference);
        let order_number = report.order_number.clone();
        self.reconcile(&order_number, Trigger::Webhook, Some(report)).await
    }

    /// User-initiated status check. The caller must own the order (or be an admin). Safe to call repeatedly.
    pub async fn check_status(
        &self,
        identity: &Identity,
        order_number: &OrderNumber,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let order = self.fetch_order(identity, order_number).await?;
        debug!("🔄️ {} requested a status check for order {}", identity.subject_id, order.order_number);
        self.reconcile(&order.order_number, Trigger::ManualCheck, None).await
    }

    /// Reconciles every `PENDING` order older than the poll threshold, and cancels those that are past the payment
    /// expiry and still show no settlement at the provider. One order failing never stops the others.
    pub async fn poll_pending_orders(&self) -> Result<PollSummary, ReconciliationError> {
        let orders = self.db.fetch_pending_orders_older_than(self.options.poll_min_age).await?;
        let mut summary = PollSummary { checked: orders.len(), ..Default::default() };
        if orders.is_empty() {
            return Ok(summary);
        }
        debug!("🕰️ Polling the provider for {} pending orders", orders.len());
        let results = stream::iter(orders)
            .map(|order| self.poll_one(order))
            .buffer_unordered(self.options.poll_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        for result in results {
            match result {
                PollResult::Updated => summary.updated += 1,
                PollResult::Unchanged => summary.unchanged += 1,
                PollResult::Expired => summary.expired += 1,
                PollResult::Failed => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    /// Opens a new payment at the provider for the order.
    ///
    /// If the provider says a transaction for this order is still active, we reconcile before answering: very often
    /// the order has in fact been paid and the customer simply went back to the payment method screen.
    pub async fn create_payment(
        &self,
        identity: &Identity,
        order_number: &OrderNumber,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, ReconciliationError> {
        let order = self.fetch_order(identity, order_number).await?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Paid) {
            return Err(ReconciliationError::OrderNotPayable(order.status));
        }
        let attempts = self.db.fetch_payment_attempts(&order.order_number).await?;
        let max = self.options.max_payment_attempts;
        if attempts.len() >= max as usize {
            info!("🔄️ Order {} has used all {max} payment attempts", order.order_number);
            return Err(ReconciliationError::PaymentAttemptsExhausted(order.order_number.clone(), max));
        }
        let created = tokio::time::timeout(
            self.options.query_timeout,
            self.gateway.create_transaction(&order, method, &identity.email),
        )
        .await
        .map_err(|_| ReconciliationError::GatewayUnavailable("Timed out creating the transaction".into()))?;
        match created {
            Ok(instructions) => {
                let attempt = NewPaymentAttempt::new(
                    order.order_number.clone(),
                    instructions.reference.clone(),
                    method,
                    instructions.status.to_string(),
                );
                self.db.insert_payment_attempt(attempt).await?;
                info!(
                    "🔄️ Payment {} opened for order {} via {method} ({})",
                    instructions.reference,
                    order.order_number,
                    order.amount_due()
                );
                Ok(PaymentOutcome::PaymentCreated { order, instructions })
            },
            Err(GatewayError::DuplicateInvoice(msg)) => {
                info!("🔄️ Invoice for order {} is already in use ({msg}). Reconciling first.", order.order_number);
                let order = match self.reconcile(&order.order_number, Trigger::PaymentCreation, None).await {
                    Ok(outcome) => outcome.order().clone(),
                    Err(e) if e.is_transient() || matches!(e, ReconciliationError::NoPaymentAttempt(_)) => {
                        warn!("🔄️ Reconciliation after a duplicate invoice for {} failed: {e}", order.order_number);
                        self.fresh_read(&order.order_number).await?
                    },
                    Err(e) => {
                        warn!("🔄️ Could not settle the duplicate invoice for order {}: {e}", order.order_number);
                        return Err(e);
                    },
                };
                if order.status.is_paid_or_beyond() {
                    Ok(PaymentOutcome::AlreadyPaid { order })
                } else {
                    Ok(PaymentOutcome::AttemptStillActive { order })
                }
            },
            Err(e) => {
                warn!("🔄️ Could not create a payment for order {}: {e}", order.order_number);
                Err(e.into())
            },
        }
    }

    /// Moves an order to `new_status` by fiat. Admin only. The state machine still applies.
    pub async fn admin_override(
        &self,
        identity: &Identity,
        order_number: &OrderNumber,
        new_status: OrderStatus,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        if !identity.is_admin() {
            warn!("🔄️ {} attempted an admin override on order {order_number}", identity.subject_id);
            return Err(ReconciliationError::Forbidden);
        }
        let _guard = self.locks.lock(order_number.as_str()).await;
        let order = self.fresh_read(order_number).await?;
        info!("🔄️ Admin {} is moving order {order_number} from {} to {new_status}", identity.subject_id, order.status);
        self.apply_locked(order, new_status, Trigger::AdminOverride).await
    }

    /// Fetches the order if the caller may see it.
    pub async fn fetch_order(&self, identity: &Identity, order_number: &OrderNumber) -> Result<Order, ReconciliationError> {
        let order = self.fresh_read(order_number).await?;
        if !identity.can_access(&order) {
            warn!("🔄️ {} tried to access order {order_number}, which belongs to someone else", identity.subject_id);
            return Err(ReconciliationError::Forbidden);
        }
        Ok(order)
    }

    pub async fn order_history(
        &self,
        identity: &Identity,
        order_number: &OrderNumber,
    ) -> Result<Vec<StatusChange>, ReconciliationError> {
        let order = self.fetch_order(identity, order_number).await?;
        let history = self.db.fetch_status_history(&order.order_number).await?;
        Ok(history)
    }

    async fn poll_one(&self, order: Order) -> PollResult {
        let order_number = order.order_number.clone();
        let result = self.reconcile(&order_number, Trigger::Poll, None).await;
        let still_pending = match &result {
            Ok(outcome) => outcome.status() == OrderStatus::Pending,
            Err(ReconciliationError::NoPaymentAttempt(_)) => true,
            Err(_) => false,
        };
        if still_pending && self.is_overdue(&order) {
            return match self.expire(&order_number).await {
                Ok(outcome) if outcome.is_updated() => PollResult::Expired,
                Ok(_) => PollResult::Unchanged,
                Err(e) => {
                    warn!("🕰️ Could not expire order {order_number}: {e}");
                    PollResult::Failed
                },
            };
        }
        match result {
            Ok(outcome) if outcome.is_updated() => PollResult::Updated,
            Ok(_) => PollResult::Unchanged,
            Err(ReconciliationError::NoPaymentAttempt(_)) => {
                trace!("🕰️ Order {order_number} has no payment at the provider yet");
                PollResult::Unchanged
            },
            Err(e) => {
                if e.is_transient() {
                    debug!("🕰️ Order {order_number} will be retried on the next tick: {e}");
                } else {
                    warn!("🕰️ Reconciling order {order_number} failed: {e}");
                }
                PollResult::Failed
            },
        }
    }

    fn is_overdue(&self, order: &Order) -> bool {
        Utc::now() - order.created_at > self.options.payment_expiry
    }

    async fn expire(&self, order_number: &OrderNumber) -> Result<ReconcileOutcome, ReconciliationError> {
        let _guard = self.locks.lock(order_number.as_str()).await;
        let order = self.fresh_read(order_number).await?;
        info!("🕰️ Order {order_number} has been unpaid for longer than {}. Cancelling it.", self.options.payment_expiry);
        self.apply_locked(order, OrderStatus::Cancelled, Trigger::Expiry).await
    }

    /// The shared critical section for provider-sourced reports. `report` is the webhook payload, if there is one;
    /// otherwise the provider is queried.
    async fn reconcile(
        &self,
        order_number: &OrderNumber,
        trigger: Trigger,
        report: Option<TransactionStatus>,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let _guard = self.locks.lock(order_number.as_str()).await;
        let order = self.fresh_read(order_number).await?;
        let attempts = self.db.fetch_payment_attempts(&order.order_number).await?;
        let latest_reference = attempts.last().map(|a| a.gateway_reference.clone());
        let report = match report {
            Some(r) => r,
            None => self.query_provider(&order, latest_reference.as_deref()).await?,
        };
        if let Err(e) = self.db.update_attempt_status(&report.reference, &report.status.to_string()).await {
            warn!("🔄️ Could not record provider status for payment {}: {e}", report.reference);
        }
        let proposed = match map_provider_status(&report.status) {
            StatusMapping::Mapped(status) => status,
            StatusMapping::Unmapped => {
                warn!(
                    "🔄️ Provider status {} for order {order_number} has no mapping. Leaving the order as {}.",
                    report.status, order.status
                );
                return Err(ReconciliationError::UnmappedProviderStatus(report.status.to_string()));
            },
        };
        if matches!(proposed, OrderStatus::Cancelled | OrderStatus::Failed) && order.status.is_paid_or_beyond() {
            // A failure or expiry report for an order that has been paid refers to an older, abandoned transaction.
            info!(
                "🔄️ Ignoring stale {} report ({}) for order {order_number}, which is {}",
                report.status, report.reference, order.status
            );
            return Ok(ReconcileOutcome::Unchanged { order });
        }
        let superseded = latest_reference.as_deref().is_some_and(|latest| latest != report.reference);
        if superseded && proposed != OrderStatus::Paid {
            // Money received on an old attempt still counts. Anything else it says is about a transaction we replaced.
            info!(
                "🔄️ Ignoring {} report for payment {} on order {order_number}: it has been replaced by {}",
                report.status,
                report.reference,
                latest_reference.as_deref().unwrap_or_default()
            );
            return Ok(ReconcileOutcome::Unchanged { order });
        }
        self.apply_locked(order, proposed, trigger).await
    }

    /// Decide, conditionally write, notify. Must be called with the order's lock held and `order` freshly read.
    async fn apply_locked(
        &self,
        order: Order,
        proposed: OrderStatus,
        trigger: Trigger,
    ) -> Result<ReconcileOutcome, ReconciliationError> {
        let from = order.status;
        match decide(from, proposed) {
            Decision::NoOp => {
                debug!("🔄️ Order {} is already {from}. Nothing to do ({trigger})", order.order_number);
                Ok(ReconcileOutcome::Unchanged { order })
            },
            Decision::Reject(reason) => {
                warn!("🔄️ Refusing to move order {} from {from} to {proposed} ({trigger}): {reason}", order.order_number);
                Err(ReconciliationError::IllegalTransition { from, to: proposed })
            },
            Decision::Accept => {
                let source = trigger.to_string();
                let won = self.db.compare_and_set_status(&order.order_number, from, proposed, &source).await?;
                if !won {
                    let current = self.fresh_read(&order.order_number).await?;
                    info!(
                        "🔄️ Lost the race on order {}: expected {from}, found {}. Leaving it to the winner.",
                        order.order_number, current.status
                    );
                    return Ok(ReconcileOutcome::RaceLost { order: current });
                }
                info!("🔄️ Order {} moved from {from} to {proposed} ({trigger})", order.order_number);
                let reread = self.db.fetch_order(&order.order_number).await.ok().flatten();
                let updated = reread.unwrap_or(Order { status: proposed, updated_at: Utc::now(), ..order });
                self.notifications.dispatch(&updated, from, proposed).await;
                Ok(ReconcileOutcome::Updated { order: updated, from, to: proposed })
            },
        }
    }

    async fn fresh_read(&self, order_number: &OrderNumber) -> Result<Order, ReconciliationError> {
        self.db.fetch_order(order_number).await?.ok_or_else(|| ReconciliationError::OrderNotFound(order_number.clone()))
    }

    /// Asks the provider about the order's latest payment attempt, bounded by the query timeout.
    async fn query_provider(
        &self,
        order: &Order,
        latest_reference: Option<&str>,
    ) -> Result<TransactionStatus, ReconciliationError> {
        let query = async {
            match latest_reference {
                Some(reference) => self.gateway.query_status(reference).await,
                None => self.gateway.query_status_for_order(&order.order_number).await,
            }
        };
        let report = match tokio::time::timeout(self.options.query_timeout, query).await {
            Err(_) => {
                debug!("🔄️ Status query for order {} timed out", order.order_number);
                return Err(ReconciliationError::GatewayUnavailable(format!(
                    "Status query timed out after {:?}",
                    self.options.query_timeout
                )));
            },
            Ok(Err(GatewayError::TransactionNotFound(_))) => {
                return Err(ReconciliationError::NoPaymentAttempt(order.order_number.clone()));
            },
            Ok(Err(e)) => {
                if e.is_retryable() {
                    debug!("🔄️ Status query for order {} failed: {e}", order.order_number);
                } else {
                    error!("🔄️ Status query for order {} failed and will not be retried blindly: {e}", order.order_number);
                }
                return Err(e.into());
            },
            Ok(Ok(report)) => report,
        };
        if report.order_number != order.order_number {
            error!(
                "🔄️ Provider returned transaction {} for order {} when asked about order {}",
                report.reference, report.order_number, order.order_number
            );
            return Err(ReconciliationError::GatewayRejected("Transaction belongs to a different order".into()));
        }
        Ok(report)
    }
}
