use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed purchase as persisted in the order store.
///
/// `id` is the processor's checkout-session identifier. The store performs
/// no deduplication, so redelivered events produce repeated ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Total charged, in minor currency units (cents).
    pub amount_total: i64,
    /// Absent when the processor did not collect an email address.
    pub customer_email: Option<String>,
    /// Set when the order is recorded, not when the payment happened.
    pub recorded_at: DateTime<Utc>,
}

/// One cart entry submitted for checkout-session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Displayed unit price in major currency units.
    pub price: f64,
    pub quantity: u32,
}

impl LineItem {
    /// Converts the major-unit price into minor currency units.
    pub fn unit_amount(&self) -> i64 {
        (self.price * 100.0).round() as i64
    }
}
