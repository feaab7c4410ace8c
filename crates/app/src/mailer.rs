use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use metrics::counter;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rubrunner_core::types::Order;
use rubrunner_util::EmailConfig;

pub const RECEIPT_SUBJECT: &str = "Your Rub Runner Order Confirmation";

/// Errors that can occur when building or sending a receipt email.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends plain-text order receipts over SMTP.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    /// Sends the receipt for one recorded order.
    pub async fn send_receipt(&self, order: &Order, to: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(RECEIPT_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(receipt_body(order))?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Formats the plain-text receipt with the order id and the total converted
/// back to major currency units.
pub fn receipt_body(order: &Order) -> String {
    format!(
        "Thank you for your order!\nOrder ID: {}\nTotal: ${:.2}",
        order.id,
        order.amount_total as f64 / 100.0
    )
}

/// Bounded handle for queueing receipts from the webhook path.
///
/// Enqueueing never waits: the webhook response must go out before the
/// processor's delivery deadline, so a full queue drops the receipt with a
/// warning instead of blocking.
#[derive(Clone)]
pub struct ReceiptQueue {
    sender: mpsc::Sender<Order>,
}

impl ReceiptQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Order>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queues a receipt, dropping it when the queue is full or closed.
    pub fn enqueue(&self, order: Order) {
        if let Err(err) = self.sender.try_send(order) {
            warn!(stage = "mailer", error = %err, "dropping receipt");
            counter!("receipt_emails_total", "result" => "dropped").increment(1);
        }
    }
}

/// Drains the receipt queue, sending one email per recorded order.
///
/// Failures are logged and swallowed; nothing here feeds back into the
/// webhook response. Passing `None` for the service runs the worker in
/// disabled mode, which only logs what would have been sent.
pub fn spawn_receipt_worker(
    mut receiver: mpsc::Receiver<Order>,
    service: Option<EmailService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(order) = receiver.recv().await {
            let Some(to) = order.customer_email.clone() else {
                info!(
                    stage = "mailer",
                    order_id = %order.id,
                    "order has no customer email, skipping receipt"
                );
                counter!("receipt_emails_total", "result" => "skipped").increment(1);
                continue;
            };
            let Some(service) = service.as_ref() else {
                info!(
                    stage = "mailer",
                    order_id = %order.id,
                    "mailer disabled, skipping receipt"
                );
                counter!("receipt_emails_total", "result" => "skipped").increment(1);
                continue;
            };

            match service.send_receipt(&order, &to).await {
                Ok(()) => {
                    info!(stage = "mailer", order_id = %order.id, to = %to, "receipt sent");
                    counter!("receipt_emails_total", "result" => "sent").increment(1);
                }
                Err(err) => {
                    warn!(
                        stage = "mailer",
                        order_id = %order.id,
                        error = %err,
                        "failed to send receipt"
                    );
                    counter!("receipt_emails_total", "result" => "error").increment(1);
                }
            }
        }
    })
}
