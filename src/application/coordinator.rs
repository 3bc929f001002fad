use crate::domain::event::WebhookEvent;
use crate::domain::idempotency::{IDEMPOTENCY_TTL_SECONDS, IdempotencyRecord};
use crate::domain::payment::{Payment, PaymentView};
use crate::domain::ports::{EventQueueRef, IdempotencyStoreRef, PaymentStoreRef};
use crate::domain::validation::NewPayment;
use crate::error::{PaymentError, Result};
use chrono::{Duration, Utc};
use serde_json::Value;

/// What `create` did for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new payment was persisted and its event published.
    Created { payment: Payment, response: Value },
    /// The key was already used; `response` is the cached body, unchanged.
    Replayed { payment_id: String, response: Value },
}

impl CreateOutcome {
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed { .. })
    }

    pub fn payment_id(&self) -> &str {
        match self {
            Self::Created { payment, .. } => &payment.id,
            Self::Replayed { payment_id, .. } => payment_id,
        }
    }

    pub fn response(&self) -> &Value {
        match self {
            Self::Created { response, .. } | Self::Replayed { response, .. } => response,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Self::Created { response, .. } | Self::Replayed { response, .. } => response,
        }
    }
}

/// Orchestrates payment creation.
///
/// Writes happen in a fixed order: payment, then idempotency record, then event.
/// There is no transaction across the stores, so a failure part-way leaves the
/// earlier writes in place. A payment without a record never collides with a
/// later key lookup, and a payment without an event stays in `processing`.
pub struct CreationCoordinator {
    payments: PaymentStoreRef,
    idempotency: IdempotencyStoreRef,
    queue: EventQueueRef,
    idempotency_ttl: Duration,
}

impl CreationCoordinator {
    pub fn new(
        payments: PaymentStoreRef,
        idempotency: IdempotencyStoreRef,
        queue: EventQueueRef,
    ) -> Self {
        Self {
            payments,
            idempotency,
            queue,
            idempotency_ttl: Duration::seconds(IDEMPOTENCY_TTL_SECONDS),
        }
    }

    pub fn with_idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl = ttl;
        self
    }

    pub async fn create(&self, input: NewPayment) -> Result<CreateOutcome> {
        if let Some(record) = self.idempotency.get(&input.idempotency_key).await? {
            tracing::info!(
                idempotency_key = %input.idempotency_key,
                existing_payment_id = %record.payment_id,
                "Idempotent request, returning cached response"
            );
            return Ok(CreateOutcome::Replayed {
                payment_id: record.payment_id,
                response: record.response,
            });
        }

        let now = Utc::now();
        let payment = Payment::new(input, now);
        tracing::info!(
            payment_id = %payment.id,
            merchant = %payment.merchant,
            amount = %payment.amount,
            currency = %payment.currency,
            "Creating payment"
        );

        self.payments.insert(payment.clone()).await?;

        let response = serde_json::to_value(PaymentView::from(&payment))?;
        let record = IdempotencyRecord::new(
            payment.idempotency_key.clone(),
            payment.id.clone(),
            response.clone(),
            now,
            self.idempotency_ttl,
        );

        if !self.idempotency.insert_if_absent(record).await? {
            // A concurrent request with the same key recorded its payment first.
            let winner = self
                .idempotency
                .get(&payment.idempotency_key)
                .await?
                .ok_or_else(|| {
                    PaymentError::StorageError(format!(
                        "idempotency record for {} disappeared after a conflicting insert",
                        payment.idempotency_key
                    ))
                })?;
            tracing::warn!(
                idempotency_key = %payment.idempotency_key,
                orphaned_payment_id = %payment.id,
                existing_payment_id = %winner.payment_id,
                "Lost idempotency race, answering with the recorded response"
            );
            return Ok(CreateOutcome::Replayed {
                payment_id: winner.payment_id,
                response: winner.response,
            });
        }

        self.queue
            .send(&WebhookEvent::payment_created(&payment.id, now))
            .await?;

        tracing::info!(payment_id = %payment.id, "Payment created successfully");
        Ok(CreateOutcome::Created { payment, response })
    }
}
