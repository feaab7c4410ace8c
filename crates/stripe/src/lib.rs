pub mod checkout;
pub mod webhook;

pub use checkout::{
    CheckoutClient, CheckoutSession, CreateSessionRequest, SessionLineItem, StripeError,
};
pub use webhook::{verify_event, Event, EventData, WebhookError, SIGNATURE_HEADER};
