use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a key keeps answering with its cached response.
pub const IDEMPOTENCY_TTL_SECONDS: i64 = 86_400;

/// Deduplication entry written once a payment has been persisted.
///
/// The cached `response` is the exact body returned by the first successful
/// creation; replays hand it back untouched.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub payment_id: String,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        idempotency_key: String,
        payment_id: String,
        response: serde_json::Value,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            idempotency_key,
            payment_id,
            response,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
