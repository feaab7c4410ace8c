mod catalog;
mod checkout;
mod mailer;
mod router;
mod telemetry;
mod webhook;

use reqwest::Client;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};
use url::Url;

use rubrunner_storage::OrderStore;
use rubrunner_stripe::CheckoutClient;
use rubrunner_util::{load_env_file, AppConfig};

use crate::mailer::{spawn_receipt_worker, EmailService, ReceiptQueue};

const RECEIPT_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let store = OrderStore::new(&config.orders_file);

    let http = Client::builder().build()?;
    let checkout = CheckoutClient::new(
        config.stripe.secret_key.clone(),
        Url::parse(CheckoutClient::DEFAULT_BASE_URL)?,
        http,
    );

    let (receipts, receipt_rx) = ReceiptQueue::new(RECEIPT_QUEUE_CAPACITY);
    match &config.email {
        Some(email) => {
            let service = EmailService::new(email)?;
            spawn_receipt_worker(receipt_rx, Some(service));
        }
        None => {
            warn!(stage = "mailer", "EMAIL_HOST not set, receipt emails disabled");
            spawn_receipt_worker(receipt_rx, None);
        }
    }

    let state = router::AppState::new(
        metrics,
        store,
        checkout,
        receipts,
        &config.stripe.webhook_secret,
        config.stripe.webhook_tolerance_secs,
        &config.frontend_url,
    );

    let mut app = router::app_router(state).layer(router::cors_layer(&config.frontend_url));

    if config.static_dir.is_dir() {
        info!(
            stage = "app",
            dir = %config.static_dir.display(),
            "serving static frontend"
        );
        // Unmatched routes fall back to the frontend, with index.html for
        // client-side routing.
        app = app.fallback_service(
            ServeDir::new(&config.static_dir)
                .fallback(ServeFile::new(config.static_dir.join("index.html"))),
        );
    }

    let addr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.map_err(Into::into)
}
