use serde_json::Value;

/// Event type the processor emits when a hosted checkout finishes.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Order fields extracted from a completed checkout session, before the
/// recording timestamp is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub id: String,
    pub amount_total: i64,
    pub customer_email: Option<String>,
}

/// What the webhook pipeline should do with a verified event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Persist the order and queue a receipt email.
    Record(OrderDraft),
    /// Acknowledge and do nothing. The processor expects a success response
    /// for every delivered event, acted on or not, and keeps redelivering
    /// otherwise.
    Ignore,
}

/// Classifies a verified event by its type tag.
///
/// Only `checkout.session.completed` produces work. Missing fields inside a
/// completed session never fail classification: an absent customer email is
/// carried as null.
pub fn classify(event_type: &str, object: &Value) -> Action {
    if event_type != CHECKOUT_COMPLETED {
        return Action::Ignore;
    }

    let id = object
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let amount_total = object
        .get("amount_total")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let customer_email = object
        .get("customer_email")
        .and_then(Value::as_str)
        .map(str::to_string);

    Action::Record(OrderDraft {
        id,
        amount_total,
        customer_email,
    })
}
