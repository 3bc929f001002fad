//! Payment entities, the storage ports they travel through, and request validation.

pub mod cursor;
pub mod event;
pub mod idempotency;
pub mod payment;
pub mod ports;
pub mod validation;
