use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::payment::{Amount, Currency, PaymentStatus, PaymentType};

pub const MERCHANT_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const IDEMPOTENCY_KEY_MIN_LEN: usize = 8;
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 128;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Field-level validation failures, keyed by request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
            first = false;
        }
        Ok(())
    }
}

/// A creation request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub merchant: String,
    pub amount: Amount,
    pub currency: Currency,
    pub payment_type: PaymentType,
    pub idempotency_key: String,
    pub description: Option<String>,
}

/// Body of `POST /v1/payments` as received.
///
/// Every field is optional here so that missing or malformed values are
/// reported per field by [`CreatePaymentRequest::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub merchant: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
}

impl CreatePaymentRequest {
    pub fn validate(self) -> Result<NewPayment, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let merchant = check_length(&mut errors, "merchant", self.merchant, 1, MERCHANT_MAX_LEN);
        let amount = required(&mut errors, "amount", self.amount)
            .and_then(|value| record(&mut errors, "amount", parse_amount(&value)));
        let currency = required(&mut errors, "currency", self.currency)
            .and_then(|value| record(&mut errors, "currency", Currency::from_str(&value)));
        let payment_type = required(&mut errors, "type", self.payment_type)
            .and_then(|value| record(&mut errors, "type", PaymentType::from_str(&value)));
        let idempotency_key = check_length(
            &mut errors,
            "idempotency_key",
            self.idempotency_key,
            IDEMPOTENCY_KEY_MIN_LEN,
            IDEMPOTENCY_KEY_MAX_LEN,
        );

        let description = self.description;
        if let Some(text) = &description
            && text.chars().count() > DESCRIPTION_MAX_LEN
        {
            errors.add(
                "description",
                format!("String must contain at most {DESCRIPTION_MAX_LEN} character(s)"),
            );
        }

        match (merchant, amount, currency, payment_type, idempotency_key) {
            (Some(merchant), Some(amount), Some(currency), Some(payment_type), Some(key))
                if errors.is_empty() =>
            {
                Ok(NewPayment {
                    merchant,
                    amount,
                    currency,
                    payment_type,
                    idempotency_key: key,
                    description,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Query string of `GET /v1/payments` as received. Blank values count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub status: Option<PaymentStatus>,
    pub limit: usize,
    pub cursor: Option<String>,
}

impl ListPaymentsQuery {
    pub fn validate(self) -> Result<ListRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let status = match non_blank(self.status) {
            Some(value) => record(&mut errors, "status", PaymentStatus::from_str(&value)),
            None => None,
        };

        let limit = match non_blank(self.limit) {
            Some(value) => match value.trim().parse::<i64>() {
                Ok(limit) => record(&mut errors, "limit", validate_limit(limit)),
                Err(_) => {
                    errors.add("limit", "Expected integer");
                    None
                }
            },
            None => Some(DEFAULT_PAGE_LIMIT),
        };

        match (limit, errors.is_empty()) {
            (Some(limit), true) => Ok(ListRequest {
                status,
                limit,
                cursor: non_blank(self.cursor),
            }),
            _ => Err(errors),
        }
    }
}

/// Accepts page sizes in `[1, MAX_PAGE_LIMIT]`.
pub fn validate_limit(limit: i64) -> Result<usize, String> {
    if (1..=MAX_PAGE_LIMIT as i64).contains(&limit) {
        Ok(limit as usize)
    } else {
        Err(format!(
            "Number must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
        ))
    }
}

fn parse_amount(value: &serde_json::Value) -> Result<Amount, String> {
    let serde_json::Value::Number(number) = value else {
        return Err("Expected number".to_string());
    };

    let text = number.to_string();
    let decimal = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| "Expected number".to_string())?;

    Amount::new(decimal).map_err(|e| e.to_string())
}

fn required<T>(errors: &mut ValidationErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, "Required");
    }
    value
}

fn record<T, E: ToString>(
    errors: &mut ValidationErrors,
    field: &str,
    result: Result<T, E>,
) -> Option<T> {
    result.map_err(|e| errors.add(field, e.to_string())).ok()
}

fn check_length(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    min: usize,
    max: usize,
) -> Option<String> {
    let value = required(errors, field, value)?;
    let len = value.chars().count();
    if len < min {
        errors.add(
            field,
            format!("String must contain at least {min} character(s)"),
        );
        None
    } else if len > max {
        errors.add(
            field,
            format!("String must contain at most {max} character(s)"),
        );
        None
    } else {
        Some(value)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request(body: serde_json::Value) -> CreatePaymentRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_valid_request() {
        let input = request(json!({
            "merchant": "Test Corp",
            "amount": 100.00,
            "currency": "CAD",
            "type": "eft",
            "idempotency_key": "test-key-001",
            "description": "Invoice 42"
        }))
        .validate()
        .unwrap();

        assert_eq!(input.amount.value(), dec!(100));
        assert_eq!(input.currency, Currency::Cad);
        assert_eq!(input.payment_type, PaymentType::Eft);
        assert_eq!(input.description.as_deref(), Some("Invoice 42"));
    }

    #[test]
    fn test_amount_keeps_cents() {
        let input = request(json!({
            "merchant": "Test Corp",
            "amount": 12.34,
            "currency": "USD",
            "type": "wire",
            "idempotency_key": "test-key-002"
        }))
        .validate()
        .unwrap();

        assert_eq!(input.amount.value(), dec!(12.34));
    }

    #[test]
    fn test_reports_every_invalid_field() {
        let errors = request(json!({
            "merchant": "",
            "amount": -1,
            "currency": "EUR",
            "type": "cheque",
            "idempotency_key": "short"
        }))
        .validate()
        .unwrap_err();

        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(
            fields,
            vec!["amount", "currency", "idempotency_key", "merchant", "type"]
        );
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = CreatePaymentRequest::default().validate().unwrap_err();
        assert_eq!(errors.get("merchant"), Some(&["Required".to_string()][..]));
        assert_eq!(errors.get("amount"), Some(&["Required".to_string()][..]));
        assert!(errors.get("description").is_none());
    }

    #[test]
    fn test_amount_must_be_a_number() {
        let errors = request(json!({
            "merchant": "Test Corp",
            "amount": "100",
            "currency": "CAD",
            "type": "eft",
            "idempotency_key": "test-key-003"
        }))
        .validate()
        .unwrap_err();

        assert_eq!(
            errors.get("amount"),
            Some(&["Expected number".to_string()][..])
        );
    }

    #[test]
    fn test_amount_upper_bound() {
        let errors = request(json!({
            "merchant": "Test Corp",
            "amount": 1_000_001,
            "currency": "CAD",
            "type": "eft",
            "idempotency_key": "test-key-004"
        }))
        .validate()
        .unwrap_err();

        assert!(errors.get("amount").is_some());
    }

    #[test]
    fn test_description_length() {
        let errors = request(json!({
            "merchant": "Test Corp",
            "amount": 5,
            "currency": "CAD",
            "type": "eft",
            "idempotency_key": "test-key-005",
            "description": "x".repeat(DESCRIPTION_MAX_LEN + 1)
        }))
        .validate()
        .unwrap_err();

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["description"]);
    }

    #[test]
    fn test_list_query_defaults() {
        let request = ListPaymentsQuery::default().validate().unwrap();
        assert_eq!(request.status, None);
        assert_eq!(request.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(request.cursor, None);
    }

    #[test]
    fn test_list_query_rejects_bad_values() {
        let query = ListPaymentsQuery {
            status: Some("invalid".to_string()),
            limit: Some("0".to_string()),
            cursor: None,
        };
        let errors = query.validate().unwrap_err();
        assert!(errors.get("status").is_some());
        assert!(errors.get("limit").is_some());

        let query = ListPaymentsQuery {
            limit: Some("ten".to_string()),
            ..Default::default()
        };
        assert!(query.validate().unwrap_err().get("limit").is_some());

        let query = ListPaymentsQuery {
            limit: Some("101".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_blank_query_values_are_ignored() {
        let query = ListPaymentsQuery {
            status: Some(String::new()),
            limit: Some("5".to_string()),
            cursor: Some(" ".to_string()),
        };
        let request = query.validate().unwrap();
        assert_eq!(request.status, None);
        assert_eq!(request.limit, 5);
        assert_eq!(request.cursor, None);
    }
}
