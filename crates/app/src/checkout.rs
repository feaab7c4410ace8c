use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use rubrunner_core::types::LineItem;
use rubrunner_stripe::checkout::{CreateSessionRequest, SessionLineItem};

use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<LineItem>,
}

/// Converts the submitted cart into a processor-hosted checkout session and
/// returns the page the browser should redirect to.
///
/// Any processor-side failure surfaces as a 500 carrying the processor's
/// own message, so the storefront can show something actionable.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    let line_items: Vec<SessionLineItem> = request
        .items
        .iter()
        .map(|item| SessionLineItem {
            name: item.name.clone(),
            unit_amount: item.unit_amount(),
            quantity: item.quantity,
        })
        .collect();

    let created = state
        .checkout()
        .create_session(&CreateSessionRequest {
            line_items: &line_items,
            success_url: state.success_url(),
            cancel_url: state.cancel_url(),
        })
        .await;

    match created {
        Ok(session) => match session.url {
            Some(url) => {
                info!(stage = "checkout", session_id = %session.id, "checkout session created");
                counter!("checkout_sessions_total", "result" => "ok").increment(1);
                (StatusCode::OK, Json(json!({ "url": url }))).into_response()
            }
            None => {
                error!(
                    stage = "checkout",
                    session_id = %session.id,
                    "checkout session has no redirect url"
                );
                counter!("checkout_sessions_total", "result" => "error").increment(1);
                error_response("checkout session has no redirect url".to_string())
            }
        },
        Err(err) => {
            error!(stage = "checkout", error = %err, "failed to create checkout session");
            counter!("checkout_sessions_total", "result" => "error").increment(1);
            error_response(err.to_string())
        }
    }
}

fn error_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
