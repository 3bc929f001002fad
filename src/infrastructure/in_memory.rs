use crate::domain::cursor::StatusKey;
use crate::domain::event::{QueueMessage, WebhookEvent};
use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::payment::{Outcome, Payment, PaymentStatus, Transition};
use crate::domain::ports::{EventQueue, IdempotencyStore, PaymentStore};
use crate::error::{PaymentError, Result};
use crate::infrastructure::QueueConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// A thread-safe in-memory payment table.
///
/// Payments are kept in a `BTreeMap` keyed by id, which gives the full scan its
/// stable id order. Status queries sort on demand.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<BTreeMap<String, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(PaymentError::StorageError(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(id).cloned())
    }

    async fn settle(&self, id: &str, outcome: Outcome, at: DateTime<Utc>) -> Result<Transition> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(id)
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        Ok(payment.settle(outcome, at))
    }

    async fn scan(&self, after: Option<&str>, limit: usize) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let lower = match after {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };
        Ok(payments
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, payment)| payment.clone())
            .collect())
    }

    async fn query_by_status(
        &self,
        status: PaymentStatus,
        after: Option<&StatusKey>,
        limit: usize,
    ) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut matching: Vec<(StatusKey, &Payment)> = payments
            .values()
            .filter(|payment| payment.status == status)
            .map(|payment| (StatusKey::of(payment), payment))
            .filter(|(key, _)| after.is_none_or(|after| key > after))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, payment)| payment.clone())
            .collect())
    }
}

/// A thread-safe in-memory idempotency table.
///
/// Expired records are ignored on read and replaced on insert, which stands in
/// for the TTL sweep of a real store.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<String, IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    /// Creates a new, empty in-memory idempotency store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) records.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let records = self.records.read().await;
        records.values().filter(|r| !r.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(key)
            .filter(|record| !record.is_expired(Utc::now()))
            .cloned())
    }

    async fn insert_if_absent(&self, record: IdempotencyRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.idempotency_key)
            && !existing.is_expired(Utc::now())
        {
            return Ok(false);
        }
        records.insert(record.idempotency_key.clone(), record);
        Ok(true)
    }
}

struct QueueEntry {
    message: QueueMessage,
    visible_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    messages: BTreeMap<u64, QueueEntry>,
    dead_letters: Vec<QueueMessage>,
}

/// An at-least-once queue with visibility timeouts, held in memory.
///
/// Delivery order is send order. A message received `max_receive_count` times
/// without an ack is moved to the dead-letter list on its next delivery attempt.
#[derive(Clone)]
pub struct InMemoryEventQueue {
    state: Arc<Mutex<QueueState>>,
    config: QueueConfig,
}

impl InMemoryEventQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            config,
        }
    }

    /// Messages sent and not yet acknowledged or dead-lettered.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.messages.len()
    }
}

impl Default for InMemoryEventQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn send(&self, event: &WebhookEvent) -> Result<()> {
        let body = serde_json::to_string(event)?;
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.messages.insert(
            seq,
            QueueEntry {
                message: QueueMessage {
                    message_id: Uuid::new_v4().to_string(),
                    body,
                    receive_count: 0,
                },
                visible_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let visible: Vec<u64> = state
            .messages
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(seq, _)| *seq)
            .collect();

        let mut delivered = Vec::new();
        for seq in visible {
            if delivered.len() >= max_messages {
                break;
            }

            let exhausted = state
                .messages
                .get(&seq)
                .is_some_and(|entry| entry.message.receive_count >= self.config.max_receive_count);
            if exhausted {
                if let Some(entry) = state.messages.remove(&seq) {
                    tracing::warn!(
                        message_id = %entry.message.message_id,
                        receive_count = entry.message.receive_count,
                        "Moving message to dead-letter queue"
                    );
                    state.dead_letters.push(entry.message);
                }
                continue;
            }

            if let Some(entry) = state.messages.get_mut(&seq) {
                entry.message.receive_count += 1;
                entry.visible_at = now + self.config.visibility_timeout;
                delivered.push(entry.message.clone());
            }
        }

        Ok(delivered)
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .messages
            .retain(|_, entry| entry.message.message_id != message_id);
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<QueueMessage>> {
        Ok(self.state.lock().await.dead_letters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, Currency, PaymentType};
    use crate::domain::validation::NewPayment;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn payment(key: &str) -> Payment {
        Payment::new(
            NewPayment {
                merchant: "Tim Hortons".to_string(),
                amount: Amount::new(dec!(42.50)).unwrap(),
                currency: Currency::Cad,
                payment_type: PaymentType::Interac,
                idempotency_key: key.to_string(),
                description: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_payment_store() {
        let store = InMemoryPaymentStore::new();
        let payment = payment("key-00000001");

        store.insert(payment.clone()).await.unwrap();
        let retrieved = store.get(&payment.id).await.unwrap().unwrap();
        assert_eq!(retrieved, payment);

        assert!(store.get("PAY-00000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_existing_id() {
        let store = InMemoryPaymentStore::new();
        let payment = payment("key-00000002");

        store.insert(payment.clone()).await.unwrap();
        assert!(matches!(
            store.insert(payment).await,
            Err(PaymentError::StorageError(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_settle_unknown_payment() {
        let store = InMemoryPaymentStore::new();
        let result = store
            .settle("PAY-MISSING0", Outcome::Completed, Utc::now())
            .await;
        assert!(matches!(result, Err(PaymentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scan_resumes_after_key() {
        let store = InMemoryPaymentStore::new();
        for i in 0..5 {
            store.insert(payment(&format!("key-0000001{i}"))).await.unwrap();
        }

        let first = store.scan(None, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        let rest = store.scan(Some(&first[2].id), 10).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|p| p.id > first[2].id));
    }

    #[tokio::test]
    async fn test_idempotency_insert_if_absent() {
        let store = InMemoryIdempotencyStore::new();
        let now = Utc::now();
        let record = |payment_id: &str| {
            IdempotencyRecord::new(
                "key-12345678".to_string(),
                payment_id.to_string(),
                serde_json::json!({ "id": payment_id }),
                now,
                Duration::hours(24),
            )
        };

        assert!(store.insert_if_absent(record("PAY-AAAAAAAA")).await.unwrap());
        assert!(!store.insert_if_absent(record("PAY-BBBBBBBB")).await.unwrap());

        let stored = store.get("key-12345678").await.unwrap().unwrap();
        assert_eq!(stored.payment_id, "PAY-AAAAAAAA");
    }

    #[tokio::test]
    async fn test_expired_record_frees_the_key() {
        let store = InMemoryIdempotencyStore::new();
        let long_ago = Utc::now() - Duration::days(2);
        let expired = IdempotencyRecord::new(
            "key-12345678".to_string(),
            "PAY-AAAAAAAA".to_string(),
            serde_json::json!({}),
            long_ago,
            Duration::hours(24),
        );
        assert!(store.insert_if_absent(expired).await.unwrap());
        assert!(store.get("key-12345678").await.unwrap().is_none());
        assert!(store.is_empty().await);

        let fresh = IdempotencyRecord::new(
            "key-12345678".to_string(),
            "PAY-BBBBBBBB".to_string(),
            serde_json::json!({}),
            Utc::now(),
            Duration::hours(24),
        );
        assert!(store.insert_if_absent(fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_hides_received_messages() {
        let queue = InMemoryEventQueue::new(QueueConfig {
            visibility_timeout: Duration::seconds(30),
            max_receive_count: 5,
        });
        queue
            .send(&WebhookEvent::payment_created("PAY-12345678", Utc::now()))
            .await
            .unwrap();

        let batch = queue.receive(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].receive_count, 1);

        // Still in flight
        assert!(queue.receive(10).await.unwrap().is_empty());
        assert_eq!(queue.pending().await, 1);

        queue.ack(&batch[0].message_id).await.unwrap();
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_queue_redelivers_then_dead_letters() {
        let queue = InMemoryEventQueue::new(QueueConfig {
            visibility_timeout: Duration::zero(),
            max_receive_count: 2,
        });
        queue
            .send(&WebhookEvent::payment_created("PAY-12345678", Utc::now()))
            .await
            .unwrap();

        assert_eq!(queue.receive(1).await.unwrap()[0].receive_count, 1);
        assert_eq!(queue.receive(1).await.unwrap()[0].receive_count, 2);
        assert!(queue.receive(1).await.unwrap().is_empty());

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(queue.pending().await, 0);
    }
}
