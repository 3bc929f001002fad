use crate::domain::event::{
    BatchItemFailure, BatchResponse, PAYMENT_CREATED, QueueMessage, WebhookEvent,
};
use crate::domain::payment::{Outcome, Payment, PaymentStatus, Transition};
use crate::domain::ports::PaymentStoreRef;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

pub const DEFAULT_SUCCESS_RATE: f64 = 0.85;

/// Decides how a `processing` payment ends.
pub trait OutcomePolicy: Send + Sync {
    fn decide(&self, payment: &Payment) -> Outcome;
}

/// Completes a payment with probability `success_rate`, fails it otherwise.
/// Rates outside `[0, 1]` are clamped; NaN falls back to the default rate.
#[derive(Debug, Clone, Copy)]
pub struct RandomOutcome {
    success_rate: f64,
}

impl RandomOutcome {
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() {
            DEFAULT_SUCCESS_RATE
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self { success_rate }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for RandomOutcome {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATE)
    }
}

impl OutcomePolicy for RandomOutcome {
    fn decide(&self, _payment: &Payment) -> Outcome {
        if rand::thread_rng().gen_bool(self.success_rate) {
            Outcome::Completed
        } else {
            Outcome::Failed
        }
    }
}

/// Always decides the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub Outcome);

impl OutcomePolicy for FixedOutcome {
    fn decide(&self, _payment: &Payment) -> Outcome {
        self.0
    }
}

/// What happened to a single queue message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProcessedItem {
    Settled(PaymentStatus),
    /// Redelivery of an event whose payment had already settled.
    AlreadyTerminal(PaymentStatus),
    /// Not an event this processor handles.
    Skipped,
}

/// Consumes `payment.created` events and settles their payments.
pub struct StatusProcessor {
    payments: PaymentStoreRef,
    policy: Arc<dyn OutcomePolicy>,
}

impl StatusProcessor {
    pub fn new(payments: PaymentStoreRef, policy: Arc<dyn OutcomePolicy>) -> Self {
        Self { payments, policy }
    }

    /// Processes every message independently and lists the ones that must be redelivered.
    pub async fn process_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        let mut response = BatchResponse::default();

        for message in messages {
            match self.process_message(message).await {
                Ok(item) => {
                    tracing::debug!(message_id = %message.message_id, ?item, "Message processed");
                }
                Err(e) => {
                    tracing::error!(
                        message_id = %message.message_id,
                        receive_count = message.receive_count,
                        error = %e,
                        "Failed to process message"
                    );
                    response.batch_item_failures.push(BatchItemFailure {
                        item_identifier: message.message_id.clone(),
                    });
                }
            }
        }

        response
    }

    pub async fn process_message(&self, message: &QueueMessage) -> Result<ProcessedItem> {
        let event: WebhookEvent = serde_json::from_str(&message.body)?;

        if event.event_type != PAYMENT_CREATED {
            tracing::warn!(
                message_id = %message.message_id,
                event_type = %event.event_type,
                "Unknown event type, skipping"
            );
            return Ok(ProcessedItem::Skipped);
        }

        let payment = self
            .payments
            .get(&event.payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(event.payment_id.clone()))?;

        if payment.status.is_terminal() {
            tracing::info!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment already settled, ignoring redelivery"
            );
            return Ok(ProcessedItem::AlreadyTerminal(payment.status));
        }

        let outcome = self.policy.decide(&payment);
        match self.payments.settle(&payment.id, outcome, Utc::now()).await? {
            Transition::Applied(status) => {
                tracing::info!(payment_id = %payment.id, %status, "Payment status updated");
                Ok(ProcessedItem::Settled(status))
            }
            Transition::Unchanged(status) => {
                tracing::info!(
                    payment_id = %payment.id,
                    %status,
                    "Payment settled concurrently, keeping stored status"
                );
                Ok(ProcessedItem::AlreadyTerminal(status))
            }
        }
    }
}
