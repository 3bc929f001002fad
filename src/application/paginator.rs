use crate::domain::cursor::{PageKey, StatusKey};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::PaymentStoreRef;
use crate::domain::validation::{ValidationErrors, validate_limit};
use crate::error::{PaymentError, Result};

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Payment>,
    /// Present only when at least one more matching payment exists.
    pub next_cursor: Option<String>,
}

/// Read side: single lookups and cursor-paginated listings.
pub struct Paginator {
    payments: PaymentStoreRef,
}

impl Paginator {
    pub fn new(payments: PaymentStoreRef) -> Self {
        Self { payments }
    }

    pub async fn get(&self, id: &str) -> Result<Payment> {
        self.payments
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }

    /// Lists payments in id order, or newest first when filtered by `status`.
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let limit = validate_limit(i64::try_from(limit).unwrap_or(i64::MAX)).map_err(|msg| {
            let mut errors = ValidationErrors::new();
            errors.add("limit", msg);
            PaymentError::ValidationError(errors)
        })?;

        let after = cursor.map(PageKey::decode).transpose()?;

        // One extra item tells whether another page exists.
        let fetch = limit + 1;
        let mut items = match (status, after) {
            (None, None) => self.payments.scan(None, fetch).await?,
            (None, Some(PageKey::Scan { id })) => self.payments.scan(Some(&id), fetch).await?,
            (Some(status), None) => self.payments.query_by_status(status, None, fetch).await?,
            (
                Some(status),
                Some(PageKey::Status {
                    status: issued_for,
                    created_at,
                    id,
                }),
            ) if issued_for == status => {
                let key = StatusKey { created_at, id };
                self.payments
                    .query_by_status(status, Some(&key), fetch)
                    .await?
            }
            (_, Some(_)) => {
                return Err(PaymentError::InvalidCursor(
                    "cursor was issued for a different listing".to_string(),
                ));
            }
        };

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            match items.last() {
                Some(last) => Some(PageKey::after(status, last).encode()?),
                None => None,
            }
        } else {
            None
        };

        tracing::debug!(
            status = ?status,
            count = items.len(),
            has_more = next_cursor.is_some(),
            "Listed payments"
        );
        Ok(Page { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, Currency, Outcome, PaymentType};
    use crate::domain::ports::PaymentStore;
    use crate::domain::validation::NewPayment;
    use crate::infrastructure::in_memory::InMemoryPaymentStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn seeded(count: usize) -> InMemoryPaymentStore {
        let store = InMemoryPaymentStore::new();
        let base = Utc::now();
        for i in 0..count {
            let mut payment = Payment::new(
                NewPayment {
                    merchant: format!("Merchant {i}"),
                    amount: Amount::new(dec!(10.00)).unwrap(),
                    currency: Currency::Cad,
                    payment_type: PaymentType::Ach,
                    idempotency_key: format!("list-key-{i:04}"),
                    description: None,
                },
                base + Duration::seconds(i as i64),
            );
            if i % 2 == 0 {
                payment.settle(Outcome::Completed, base);
            }
            store.insert(payment).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_limit_is_checked_first() {
        let paginator = Paginator::new(Arc::new(InMemoryPaymentStore::new()));
        assert!(matches!(
            paginator.list(None, 0, None).await,
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            paginator.list(None, 101, Some("garbage")).await,
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_last_page_has_no_cursor() {
        let paginator = Paginator::new(Arc::new(seeded(4).await));

        let page = paginator.list(None, 4, None).await.unwrap();
        assert_eq!(page.items.len(), 4);
        assert!(page.next_cursor.is_none());

        let page = paginator.list(None, 3, None).await.unwrap();
        assert_eq!(page.items.len(), 3);
        let rest = paginator
            .list(None, 3, page.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_status_listing_is_newest_first() {
        let paginator = Paginator::new(Arc::new(seeded(9).await));

        let page = paginator
            .list(Some(PaymentStatus::Completed), 5, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(page.items.iter().all(|p| p.status == PaymentStatus::Completed));
        assert!(
            page.items
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_cursor_is_bound_to_its_filter() {
        let paginator = Paginator::new(Arc::new(seeded(6).await));

        let scan = paginator.list(None, 2, None).await.unwrap();
        let result = paginator
            .list(Some(PaymentStatus::Completed), 2, scan.next_cursor.as_deref())
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidCursor(_))));

        let completed = paginator
            .list(Some(PaymentStatus::Completed), 1, None)
            .await
            .unwrap();
        let result = paginator
            .list(Some(PaymentStatus::Processing), 1, completed.next_cursor.as_deref())
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_get_missing_payment() {
        let paginator = Paginator::new(Arc::new(InMemoryPaymentStore::new()));
        assert!(matches!(
            paginator.get("PAY-00000000").await,
            Err(PaymentError::NotFound(id)) if id == "PAY-00000000"
        ));
    }
}
