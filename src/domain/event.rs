use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PAYMENT_CREATED: &str = "payment.created";

/// Lifecycle instruction carried by the event queue.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event_type: String,
    pub payment_id: String,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn payment_created(payment_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: PAYMENT_CREATED.to_string(),
            payment_id: payment_id.to_string(),
            timestamp,
        }
    }
}

/// A message as handed out by the queue.
///
/// `receive_count` includes the current delivery.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    pub receive_count: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Per-batch consumer report. Items not listed are acknowledged.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn is_failed(&self, message_id: &str) -> bool {
        self.batch_item_failures
            .iter()
            .any(|failure| failure.item_identifier == message_id)
    }
}
