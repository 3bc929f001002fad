//! Sample data for local runs.

use crate::domain::payment::{Amount, AmountError, Currency, PaymentType};
use crate::domain::validation::NewPayment;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;

pub const MERCHANTS: [&str; 18] = [
    "Shopify Inc.",
    "Tim Hortons",
    "Bell Canada",
    "Lululemon Athletica",
    "RBC Royal Bank",
    "Air Canada",
    "Canadian Tire",
    "Telus Communications",
    "Manulife Financial",
    "Toronto-Dominion Bank",
    "Enbridge Gas",
    "Rogers Communications",
    "Loblaw Companies",
    "Brookfield Asset Mgmt",
    "Sun Life Financial",
    "Magna International",
    "BCE Inc.",
    "Nutrien Ltd.",
];

const CURRENCIES: [Currency; 2] = [Currency::Cad, Currency::Usd];
const PAYMENT_TYPES: [PaymentType; 4] = [
    PaymentType::Wire,
    PaymentType::Eft,
    PaymentType::Interac,
    PaymentType::Ach,
];

/// Amounts between 10.00 and 50 000.00, in cents.
const MIN_CENTS: i64 = 1_000;
const MAX_CENTS: i64 = 5_000_000;

/// Builds `count` random creation requests, each with a unique idempotency key.
pub fn sample_payments<R: Rng>(
    rng: &mut R,
    count: usize,
) -> Result<Vec<NewPayment>, AmountError> {
    let stamp = Utc::now().timestamp_millis();
    (0..count)
        .map(|index| {
            let cents = rng.gen_range(MIN_CENTS..=MAX_CENTS);
            let suffix: String = (0..8)
                .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
                .collect();

            Ok(NewPayment {
                merchant: pick(rng, &MERCHANTS).to_string(),
                amount: Amount::new(Decimal::new(cents, 2))?,
                currency: *pick(rng, &CURRENCIES),
                payment_type: *pick(rng, &PAYMENT_TYPES),
                idempotency_key: format!("seed-{stamp}-{index}-{suffix}"),
                description: Some(format!("Seed payment #{}", index + 1)),
            })
        })
        .collect()
}

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn test_sample_payments_are_valid_and_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = sample_payments(&mut rng, 50).unwrap();

        assert_eq!(samples.len(), 50);
        let keys: HashSet<_> = samples.iter().map(|p| p.idempotency_key.as_str()).collect();
        assert_eq!(keys.len(), 50);

        for sample in &samples {
            let amount = sample.amount.value();
            assert!(amount >= Decimal::new(MIN_CENTS, 2));
            assert!(amount <= Decimal::new(MAX_CENTS, 2));
            assert!(amount.scale() <= 2);
            assert!(MERCHANTS.contains(&sample.merchant.as_str()));
            assert!(sample.idempotency_key.len() >= 8);
        }
    }
}
