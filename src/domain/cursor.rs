//! Opaque pagination cursors.
//!
//! A cursor is the URL-safe base64 of a JSON [`PageKey`]: the storage key of the
//! last item on the previous page, tagged with the listing it belongs to.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::payment::{Payment, PaymentStatus};
use crate::error::{PaymentError, Result};

/// Position of a payment in the status index.
///
/// Index order is `created_at` descending, then `id` ascending.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct StatusKey {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl StatusKey {
    pub fn of(payment: &Payment) -> Self {
        Self {
            created_at: payment.created_at,
            id: payment.id.clone(),
        }
    }
}

impl Ord for StatusKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for StatusKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "index", rename_all = "snake_case")]
pub enum PageKey {
    Scan {
        id: String,
    },
    Status {
        status: PaymentStatus,
        created_at: DateTime<Utc>,
        id: String,
    },
}

impl PageKey {
    /// The key that resumes a listing right after `payment`.
    pub fn after(filter: Option<PaymentStatus>, payment: &Payment) -> Self {
        match filter {
            None => Self::Scan {
                id: payment.id.clone(),
            },
            Some(status) => Self::Status {
                status,
                created_at: payment.created_at,
                id: payment.id.clone(),
            },
        }
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.trim())
            .map_err(|_| PaymentError::InvalidCursor("cursor is not valid base64".to_string()))?;
        serde_json::from_slice(&bytes).map_err(|_| {
            PaymentError::InvalidCursor("cursor does not describe a page position".to_string())
        })
    }
}
