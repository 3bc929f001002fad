#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payflow::application::{CreationCoordinator, FixedOutcome, Paginator, StatusProcessor};
use payflow::domain::cursor::StatusKey;
use payflow::domain::event::{QueueMessage, WebhookEvent};
use payflow::domain::idempotency::IdempotencyRecord;
use payflow::domain::payment::{
    Amount, Currency, Outcome, Payment, PaymentStatus, PaymentType, Transition,
};
use payflow::domain::ports::{EventQueue, IdempotencyStore, PaymentStore};
use payflow::domain::validation::NewPayment;
use payflow::error::{PaymentError, Result};
use payflow::infrastructure::in_memory::{
    InMemoryEventQueue, InMemoryIdempotencyStore, InMemoryPaymentStore,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Barrier;

pub fn new_payment(key: &str) -> NewPayment {
    NewPayment {
        merchant: "Test Corp".to_string(),
        amount: Amount::new(dec!(100.00)).unwrap(),
        currency: Currency::Cad,
        payment_type: PaymentType::Eft,
        idempotency_key: key.to_string(),
        description: None,
    }
}

/// In-memory stores plus the components wired over them.
pub struct Harness {
    pub payments: InMemoryPaymentStore,
    pub records: InMemoryIdempotencyStore,
    pub queue: InMemoryEventQueue,
    pub coordinator: Arc<CreationCoordinator>,
    pub paginator: Arc<Paginator>,
}

impl Harness {
    pub fn new() -> Self {
        let payments = InMemoryPaymentStore::new();
        let records = InMemoryIdempotencyStore::new();
        let queue = InMemoryEventQueue::default();
        let coordinator = CreationCoordinator::new(
            Arc::new(payments.clone()),
            Arc::new(records.clone()),
            Arc::new(queue.clone()),
        );
        Self {
            paginator: Arc::new(Paginator::new(Arc::new(payments.clone()))),
            coordinator: Arc::new(coordinator),
            payments,
            records,
            queue,
        }
    }

    pub fn processor(&self, outcome: Outcome) -> StatusProcessor {
        StatusProcessor::new(
            Arc::new(self.payments.clone()),
            Arc::new(FixedOutcome(outcome)),
        )
    }

    /// Receives everything visible and settles it with `outcome`.
    pub async fn settle_all(&self, outcome: Outcome) -> Vec<QueueMessage> {
        let messages = self.queue.receive(1_000).await.unwrap();
        let response = self.processor(outcome).process_batch(&messages).await;
        for message in &messages {
            if !response.is_failed(&message.message_id) {
                self.queue.ack(&message.message_id).await.unwrap();
            }
        }
        messages
    }
}

/// A queue that is always unreachable.
pub struct FailingQueue;

#[async_trait]
impl EventQueue for FailingQueue {
    async fn send(&self, _event: &WebhookEvent) -> Result<()> {
        Err(PaymentError::QueueError("connection refused".to_string()))
    }

    async fn receive(&self, _max_messages: usize) -> Result<Vec<QueueMessage>> {
        Err(PaymentError::QueueError("connection refused".to_string()))
    }

    async fn ack(&self, _message_id: &str) -> Result<()> {
        Err(PaymentError::QueueError("connection refused".to_string()))
    }

    async fn dead_letters(&self) -> Result<Vec<QueueMessage>> {
        Ok(Vec::new())
    }
}

/// A payment store whose every call fails.
pub struct UnavailablePaymentStore;

fn store_down() -> PaymentError {
    PaymentError::StorageError("table unreachable".to_string())
}

#[async_trait]
impl PaymentStore for UnavailablePaymentStore {
    async fn insert(&self, _payment: Payment) -> Result<()> {
        Err(store_down())
    }

    async fn get(&self, _id: &str) -> Result<Option<Payment>> {
        Err(store_down())
    }

    async fn settle(&self, _id: &str, _outcome: Outcome, _at: DateTime<Utc>) -> Result<Transition> {
        Err(store_down())
    }

    async fn scan(&self, _after: Option<&str>, _limit: usize) -> Result<Vec<Payment>> {
        Err(store_down())
    }

    async fn query_by_status(
        &self,
        _status: PaymentStatus,
        _after: Option<&StatusKey>,
        _limit: usize,
    ) -> Result<Vec<Payment>> {
        Err(store_down())
    }
}

/// Holds every key lookup at a barrier so that concurrent requests all miss
/// the record before any of them writes it.
pub struct RacingIdempotencyStore {
    inner: InMemoryIdempotencyStore,
    barrier: Barrier,
}

impl RacingIdempotencyStore {
    pub fn new(inner: InMemoryIdempotencyStore, racers: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(racers),
        }
    }
}

#[async_trait]
impl IdempotencyStore for RacingIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let record = self.inner.get(key).await?;
        if record.is_none() {
            self.barrier.wait().await;
        }
        Ok(record)
    }

    async fn insert_if_absent(&self, record: IdempotencyRecord) -> Result<bool> {
        self.inner.insert_if_absent(record).await
    }
}
