use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use serde_json::json;
use tracing::{error, info, warn};

use rubrunner_core::classifier::{classify, Action};
use rubrunner_core::types::Order;
use rubrunner_stripe::webhook::{verify_event, SIGNATURE_HEADER};

use crate::router::AppState;

/// Ingests one webhook delivery from the payment processor.
///
/// The body is taken as raw bytes because the signature covers the exact
/// bytes on the wire. Every verified delivery is acknowledged with 200,
/// including event types this service ignores and deliveries whose
/// recording failed; anything else makes the processor redeliver, and for
/// recording failures the payment itself already succeeded.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = match verify_event(
        &body,
        signature,
        state.webhook_secret(),
        state.webhook_tolerance_secs(),
        state.now(),
    ) {
        Ok(event) => event,
        Err(err) => {
            warn!(stage = "ingress", error = %err, "webhook verification failed");
            counter!("webhook_invalid_signature_total").increment(1);
            histogram!("webhook_ack_latency_seconds").record(start.elapsed().as_secs_f64());
            return (StatusCode::BAD_REQUEST, format!("Webhook Error: {err}")).into_response();
        }
    };

    match classify(&event.event_type, &event.data.object) {
        Action::Record(draft) => {
            counter!("webhook_ingress_total", "type" => "handled").increment(1);
            let order = Order {
                id: draft.id,
                amount_total: draft.amount_total,
                customer_email: draft.customer_email,
                recorded_at: state.now(),
            };

            match state.store().append(&order).await {
                Ok(()) => {
                    info!(
                        stage = "storage",
                        event_id = %event.id,
                        order_id = %order.id,
                        amount_total = order.amount_total,
                        "order recorded"
                    );
                    counter!("orders_recorded_total").increment(1);
                }
                Err(err) => {
                    error!(
                        stage = "storage",
                        event_id = %event.id,
                        order_id = %order.id,
                        error = %err,
                        "failed to record order"
                    );
                    counter!("order_store_errors_total").increment(1);
                }
            }

            state.receipts().enqueue(order);
        }
        Action::Ignore => {
            info!(
                stage = "classifier",
                event_id = %event.id,
                event_type = %event.event_type,
                "ignoring event type"
            );
            counter!("webhook_ingress_total", "type" => "ignored").increment(1);
        }
    }

    histogram!("webhook_ack_latency_seconds").record(start.elapsed().as_secs_f64());
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}
