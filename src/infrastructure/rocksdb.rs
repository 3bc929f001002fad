use crate::domain::cursor::StatusKey;
use crate::domain::event::{QueueMessage, WebhookEvent};
use crate::domain::idempotency::IdempotencyRecord;
use crate::domain::payment::{Outcome, Payment, PaymentStatus, Transition};
use crate::domain::ports::{EventQueue, IdempotencyStore, PaymentStore};
use crate::error::{PaymentError, Result};
use crate::infrastructure::QueueConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for payment records, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for the status index: `status \0 inverted-micros \0 id` -> id.
pub const CF_STATUS_INDEX: &str = "payments_by_status";
/// Column Family for idempotency records, keyed by idempotency key.
pub const CF_IDEMPOTENCY: &str = "idempotency";
/// Column Family for queued events in send order.
pub const CF_QUEUE: &str = "queue";
/// Column Family for messages that exhausted their deliveries.
pub const CF_DEAD_LETTERS: &str = "dead_letters";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_PAYMENTS,
    CF_STATUS_INDEX,
    CF_IDEMPOTENCY,
    CF_QUEUE,
    CF_DEAD_LETTERS,
];

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    body: String,
    receive_count: u32,
    visible_at: DateTime<Utc>,
}

/// A persistent store implementation using RocksDB.
///
/// One database backs all three ports, each in its own Column Families.
/// Read-modify-write operations (conditional settle, create-if-absent, queue
/// leases) run under a single write guard so they are atomic within the store.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
    queue_config: QueueConfig,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    /// * `queue_config` - Visibility timeout and delivery limit for the event queue.
    pub fn open<P: AsRef<Path>>(path: P, queue_config: QueueConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
            queue_config,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StorageError(format!("{} column family not found", name)))
    }

    fn read_payment(&self, id: &str) -> Result<Option<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn status_prefix(status: PaymentStatus) -> String {
        format!("{}\0", status.as_str())
    }

    fn status_index_key(status: PaymentStatus, key: &StatusKey) -> String {
        // Inverting the timestamp makes forward iteration newest-first.
        let inverted = i64::MAX - key.created_at.timestamp_micros();
        format!("{}{:020}\0{}", Self::status_prefix(status), inverted, key.id)
    }

    fn queue_key() -> String {
        format!("{:020}-{}", Utc::now().timestamp_micros(), Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let payments = self.cf(CF_PAYMENTS)?;
        let index = self.cf(CF_STATUS_INDEX)?;

        if self.db.get_pinned_cf(payments, payment.id.as_bytes())?.is_some() {
            return Err(PaymentError::StorageError(format!(
                "payment {} already exists",
                payment.id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(payments, payment.id.as_bytes(), serde_json::to_vec(&payment)?);
        batch.put_cf(
            index,
            Self::status_index_key(payment.status, &StatusKey::of(&payment)),
            payment.id.as_bytes(),
        );
        self.db.write(batch)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Payment>> {
        self.read_payment(id)
    }

    async fn settle(&self, id: &str, outcome: Outcome, at: DateTime<Utc>) -> Result<Transition> {
        let _guard = self.write_guard.lock().await;
        let mut payment = self
            .read_payment(id)?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;

        let previous = payment.status;
        let transition = payment.settle(outcome, at);
        if let Transition::Applied(status) = transition {
            let payments = self.cf(CF_PAYMENTS)?;
            let index = self.cf(CF_STATUS_INDEX)?;
            let key = StatusKey::of(&payment);

            let mut batch = WriteBatch::default();
            batch.delete_cf(index, Self::status_index_key(previous, &key));
            batch.put_cf(index, Self::status_index_key(status, &key), payment.id.as_bytes());
            batch.put_cf(payments, payment.id.as_bytes(), serde_json::to_vec(&payment)?);
            self.db.write(batch)?;
        }

        Ok(transition)
    }

    async fn scan(&self, after: Option<&str>, limit: usize) -> Result<Vec<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        let mode = match after {
            Some(id) => IteratorMode::From(id.as_bytes(), Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            if payments.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if after.is_some_and(|id| &*key == id.as_bytes()) {
                continue;
            }
            payments.push(serde_json::from_slice(&value)?);
        }

        Ok(payments)
    }

    async fn query_by_status(
        &self,
        status: PaymentStatus,
        after: Option<&StatusKey>,
        limit: usize,
    ) -> Result<Vec<Payment>> {
        let index = self.cf(CF_STATUS_INDEX)?;
        let prefix = Self::status_prefix(status);
        let start = match after {
            Some(key) => Self::status_index_key(status, key),
            None => prefix.clone(),
        };

        let mut payments = Vec::new();
        for item in self
            .db
            .iterator_cf(index, IteratorMode::From(start.as_bytes(), Direction::Forward))
        {
            if payments.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            if &*key == start.as_bytes() && after.is_some() {
                continue;
            }

            let id = String::from_utf8_lossy(&value);
            match self.read_payment(&id)? {
                Some(payment) => payments.push(payment),
                None => {
                    tracing::warn!(payment_id = %id, "Status index points at a missing payment")
                }
            }
        }

        Ok(payments)
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        let Some(bytes) = self.db.get_cf(cf, key.as_bytes())? else {
            return Ok(None);
        };

        let record: IdempotencyRecord = serde_json::from_slice(&bytes)?;
        if record.is_expired(Utc::now()) {
            Ok(None)
        } else {
            Ok(Some(record))
        }
    }

    async fn insert_if_absent(&self, record: IdempotencyRecord) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        if IdempotencyStore::get(self, &record.idempotency_key)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let cf = self.cf(CF_IDEMPOTENCY)?;
        self.db.put_cf(
            cf,
            record.idempotency_key.as_bytes(),
            serde_json::to_vec(&record)?,
        )?;
        Ok(true)
    }
}

#[async_trait]
impl EventQueue for RocksDBStore {
    async fn send(&self, event: &WebhookEvent) -> Result<()> {
        let cf = self.cf(CF_QUEUE)?;
        let stored = StoredMessage {
            body: serde_json::to_string(event)?,
            receive_count: 0,
            visible_at: Utc::now(),
        };
        self.db
            .put_cf(cf, Self::queue_key(), serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>> {
        let _guard = self.write_guard.lock().await;
        let queue = self.cf(CF_QUEUE)?;
        let dead_letters = self.cf(CF_DEAD_LETTERS)?;
        let now = Utc::now();

        let mut batch = WriteBatch::default();
        let mut delivered = Vec::new();
        for item in self.db.iterator_cf(queue, IteratorMode::Start) {
            if delivered.len() >= max_messages {
                break;
            }
            let (key, value) = item?;
            let mut stored: StoredMessage = serde_json::from_slice(&value)?;
            if stored.visible_at > now {
                continue;
            }

            let message_id = String::from_utf8_lossy(&key).into_owned();
            if stored.receive_count >= self.queue_config.max_receive_count {
                tracing::warn!(
                    message_id = %message_id,
                    receive_count = stored.receive_count,
                    "Moving message to dead-letter queue"
                );
                let dead = QueueMessage {
                    message_id,
                    body: stored.body,
                    receive_count: stored.receive_count,
                };
                batch.delete_cf(queue, &key);
                batch.put_cf(dead_letters, &key, serde_json::to_vec(&dead)?);
                continue;
            }

            stored.receive_count += 1;
            stored.visible_at = now + self.queue_config.visibility_timeout;
            batch.put_cf(queue, &key, serde_json::to_vec(&stored)?);
            delivered.push(QueueMessage {
                message_id,
                body: stored.body,
                receive_count: stored.receive_count,
            });
        }
        self.db.write(batch)?;

        Ok(delivered)
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        let cf = self.cf(CF_QUEUE)?;
        self.db.delete_cf(cf, message_id.as_bytes())?;
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<QueueMessage>> {
        let cf = self.cf(CF_DEAD_LETTERS)?;
        let mut messages = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            messages.push(serde_json::from_slice(&value)?);
        }
        Ok(messages)
    }
}
