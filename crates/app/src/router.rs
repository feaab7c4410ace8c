use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;

use rubrunner_storage::OrderStore;
use rubrunner_stripe::CheckoutClient;

use crate::mailer::ReceiptQueue;
use crate::{catalog, checkout, telemetry, webhook};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    store: OrderStore,
    checkout: CheckoutClient,
    receipts: ReceiptQueue,
    webhook_secret: Arc<str>,
    webhook_tolerance_secs: i64,
    success_url: Arc<str>,
    cancel_url: Arc<str>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        store: OrderStore,
        checkout: CheckoutClient,
        receipts: ReceiptQueue,
        webhook_secret: &str,
        webhook_tolerance_secs: i64,
        frontend_url: &str,
    ) -> Self {
        Self {
            metrics,
            store,
            checkout,
            receipts,
            webhook_secret: webhook_secret.into(),
            webhook_tolerance_secs,
            success_url: format!("{frontend_url}/success").into(),
            cancel_url: format!("{frontend_url}/cart").into(),
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn checkout(&self) -> &CheckoutClient {
        &self.checkout
    }

    pub fn receipts(&self) -> &ReceiptQueue {
        &self.receipts
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    pub fn webhook_tolerance_secs(&self) -> i64 {
        self.webhook_tolerance_secs
    }

    pub fn success_url(&self) -> &str {
        &self.success_url
    }

    pub fn cancel_url(&self) -> &str {
        &self.cancel_url
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/products", get(catalog::list_products))
        .route(
            "/create-checkout-session",
            post(checkout::create_checkout_session),
        )
        .route("/webhook", post(webhook::handle))
        .with_state(state)
}

/// Restricts browser access to the configured frontend origin.
pub fn cors_layer(frontend_url: &str) -> CorsLayer {
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        Err(_) => CorsLayer::new(),
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}
