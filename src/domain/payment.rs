use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::validation::NewPayment;

pub const PAYMENT_ID_PREFIX: &str = "PAY";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {kind}: expected one of {expected}")]
pub struct ParseVariantError {
    kind: &'static str,
    expected: &'static str,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Processing,
    Completed,
    Failed,
    Pending,
}

impl PaymentStatus {
    pub const ALL: [Self; 4] = [
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }

    /// `completed` and `failed` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(ParseVariantError {
                kind: "status",
                expected: "'processing' | 'completed' | 'failed' | 'pending'",
            })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Cad,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cad => "CAD",
            Self::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAD" => Ok(Self::Cad),
            "USD" => Ok(Self::Usd),
            _ => Err(ParseVariantError {
                kind: "currency",
                expected: "'CAD' | 'USD'",
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Wire,
    Eft,
    Interac,
    Ach,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wire => "wire",
            Self::Eft => "eft",
            Self::Interac => "interac",
            Self::Ach => "ach",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wire" => Ok(Self::Wire),
            "eft" => Ok(Self::Eft),
            "interac" => Ok(Self::Interac),
            "ach" => Ok(Self::Ach),
            _ => Err(ParseVariantError {
                kind: "type",
                expected: "'wire' | 'eft' | 'interac' | 'ach'",
            }),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Number must be greater than 0")]
    NotPositive,
    #[error("Number must be less than or equal to 1000000")]
    TooLarge,
}

/// A payment amount in `(0, 1_000_000]`.
///
/// Serialized as a plain JSON number so the projection reads the way clients sent it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Amount {
    pub fn max() -> Decimal {
        Decimal::from(1_000_000)
    }

    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            Err(AmountError::NotPositive)
        } else if value > Self::max() {
            Err(AmountError::TooLarge)
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The terminal result decided for a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
}

impl From<Outcome> for PaymentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => Self::Completed,
            Outcome::Failed => Self::Failed,
        }
    }
}

/// Result of a conditional status update.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    Applied(PaymentStatus),
    /// The payment had already left `processing`; nothing was written.
    Unchanged(PaymentStatus),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: String,
    pub merchant: String,
    pub amount: Amount,
    pub currency: Currency,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Builds a fresh payment in `processing` with a newly generated id.
    pub fn new(input: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::generate_id(),
            merchant: input.merchant,
            amount: input.amount,
            currency: input.currency,
            payment_type: input.payment_type,
            status: PaymentStatus::Processing,
            idempotency_key: input.idempotency_key,
            description: input.description,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// `PAY-` followed by eight upper-case hex characters.
    pub fn generate_id() -> String {
        let uuid = Uuid::new_v4().simple().to_string();
        format!("{}-{}", PAYMENT_ID_PREFIX, uuid[..8].to_uppercase())
    }

    /// Moves a `processing` payment to its terminal status.
    pub fn settle(&mut self, outcome: Outcome, at: DateTime<Utc>) -> Transition {
        if self.status != PaymentStatus::Processing {
            return Transition::Unchanged(self.status);
        }

        self.status = outcome.into();
        self.updated_at = at;
        self.completed_at = Some(at);
        Transition::Applied(self.status)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The externally visible shape of a payment, shared by every endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentView {
    pub id: String,
    pub merchant: String,
    pub amount: Amount,
    pub currency: Currency,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.clone(),
            merchant: payment.merchant.clone(),
            amount: payment.amount,
            currency: payment.currency,
            payment_type: payment.payment_type,
            status: payment.status,
            idempotency_key: payment.idempotency_key.clone(),
            description: payment.description.clone(),
            created_at: format_timestamp(&payment.created_at),
            updated_at: Some(format_timestamp(&payment.updated_at)),
            completed_at: payment.completed_at.as_ref().map(format_timestamp),
        }
    }
}
