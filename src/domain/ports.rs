use super::cursor::StatusKey;
use super::event::{QueueMessage, WebhookEvent};
use super::idempotency::IdempotencyRecord;
use super::payment::{Outcome, Payment, PaymentStatus, Transition};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert-only; an existing id is an error.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Payment>>;
    /// Conditional update: writes only while the payment is still `processing`.
    async fn settle(&self, id: &str, outcome: Outcome, at: DateTime<Utc>) -> Result<Transition>;
    /// Up to `limit` payments in id order, strictly after `after`.
    async fn scan(&self, after: Option<&str>, limit: usize) -> Result<Vec<Payment>>;
    /// Up to `limit` payments with `status`, newest first, strictly after `after`.
    async fn query_by_status(
        &self,
        status: PaymentStatus,
        after: Option<&StatusKey>,
        limit: usize,
    ) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Expired records are reported as absent.
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>>;
    /// Create-if-absent. Returns `false` when a live record already holds the key.
    async fn insert_if_absent(&self, record: IdempotencyRecord) -> Result<bool>;
}

#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn send(&self, event: &WebhookEvent) -> Result<()>;
    /// Hands out up to `max_messages` visible messages and hides them for the
    /// visibility timeout. Unacknowledged messages are delivered again.
    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>>;
    async fn ack(&self, message_id: &str) -> Result<()>;
    async fn dead_letters(&self) -> Result<Vec<QueueMessage>>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type IdempotencyStoreRef = Arc<dyn IdempotencyStore>;
pub type EventQueueRef = Arc<dyn EventQueue>;
