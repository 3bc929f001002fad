//! Storage and queue adapters for the domain ports.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use crate::domain::ports::{EventQueueRef, IdempotencyStoreRef, PaymentStoreRef};
use chrono::Duration;
use in_memory::{InMemoryEventQueue, InMemoryIdempotencyStore, InMemoryPaymentStore};
use std::sync::Arc;

pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: i64 = 30;
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// Delivery semantics of the event queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a received message stays hidden before it is delivered again.
    pub visibility_timeout: Duration,
    /// Deliveries allowed before a message is dead-lettered.
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::seconds(DEFAULT_VISIBILITY_TIMEOUT_SECONDS),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }
}

/// The three stores a running service is wired with.
#[derive(Clone)]
pub struct Ports {
    pub payments: PaymentStoreRef,
    pub idempotency: IdempotencyStoreRef,
    pub queue: EventQueueRef,
}

impl Ports {
    pub fn in_memory(queue_config: QueueConfig) -> Self {
        Self {
            payments: Arc::new(InMemoryPaymentStore::new()),
            idempotency: Arc::new(InMemoryIdempotencyStore::new()),
            queue: Arc::new(InMemoryEventQueue::new(queue_config)),
        }
    }

    /// Backs every port with one RocksDB database at `path`.
    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb<P: AsRef<std::path::Path>>(
        path: P,
        queue_config: QueueConfig,
    ) -> crate::error::Result<Self> {
        let store = rocksdb::RocksDBStore::open(path, queue_config)?;
        Ok(Self {
            payments: Arc::new(store.clone()),
            idempotency: Arc::new(store.clone()),
            queue: Arc::new(store),
        })
    }
}
