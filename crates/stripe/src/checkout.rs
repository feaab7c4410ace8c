use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Client for the processor's hosted-checkout session API.
#[derive(Clone)]
pub struct CheckoutClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

/// One line of the cart, priced in minor currency units.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Parameters for creating a hosted checkout session.
pub struct CreateSessionRequest<'a> {
    pub line_items: &'a [SessionLineItem],
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// A processor-hosted checkout session ready for browser redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Errors produced by the checkout client.
#[derive(Debug, Error)]
pub enum StripeError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    // Display carries only the processor's own message so callers can
    // surface it verbatim to the requesting client.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("line item quantity must be a positive integer")]
    ZeroQuantity,
}

impl CheckoutClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com/v1/";

    /// Creates a new checkout client with the provided configuration.
    pub fn new(api_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Creates a payment-mode checkout session for the given cart and
    /// returns the hosted page the browser should be redirected to.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let url = self.base_url.join("checkout/sessions")?;

        let mut form: Vec<(String, String)> = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.to_string()),
            ("cancel_url".to_string(), request.cancel_url.to_string()),
        ];
        for (index, item) in request.line_items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(StripeError::ZeroQuantity);
            }
            form.push((
                format!("line_items[{index}][price_data][currency]"),
                "usd".to_string(),
            ));
            form.push((
                format!("line_items[{index}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{index}][price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((
                format!("line_items[{index}][quantity]"),
                item.quantity.to_string(),
            ));
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status,
                message: api_message(status, &body),
            });
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn api_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| format!("unexpected status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: &Url) -> CheckoutClient {
        CheckoutClient::new(
            "sk_test_key",
            base_url.clone(),
            Client::builder().build().expect("client"),
        )
    }

    fn cart() -> Vec<SessionLineItem> {
        vec![SessionLineItem {
            name: "X".to_string(),
            unit_amount: 1099,
            quantity: 2,
        }]
    }

    #[tokio::test]
    async fn create_session_sends_minor_units_and_quantity() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/checkout/sessions")
                    .header("Authorization", "Bearer sk_test_key")
                    .x_www_form_urlencoded_tuple("mode", "payment")
                    .x_www_form_urlencoded_tuple("payment_method_types[0]", "card")
                    .x_www_form_urlencoded_tuple("success_url", "https://shop.test/success")
                    .x_www_form_urlencoded_tuple("cancel_url", "https://shop.test/cart")
                    .x_www_form_urlencoded_tuple(
                        "line_items[0][price_data][product_data][name]",
                        "X",
                    )
                    .x_www_form_urlencoded_tuple(
                        "line_items[0][price_data][unit_amount]",
                        "1099",
                    )
                    .x_www_form_urlencoded_tuple("line_items[0][quantity]", "2");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.stripe.com/c/pay/cs_test_1"
                }));
            })
            .await;

        let session = client
            .create_session(&CreateSessionRequest {
                line_items: &cart(),
                success_url: "https://shop.test/success",
                cancel_url: "https://shop.test/cart",
            })
            .await
            .expect("create session");
        mock.assert_async().await;

        assert_eq!(session.id, "cs_test_1");
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.stripe.com/c/pay/cs_test_1")
        );
    }

    #[tokio::test]
    async fn api_failure_surfaces_processor_message() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/checkout/sessions");
                then.status(400).json_body(json!({
                    "error": { "message": "Invalid integer: -1" }
                }));
            })
            .await;

        let err = client
            .create_session(&CreateSessionRequest {
                line_items: &cart(),
                success_url: "https://shop.test/success",
                cancel_url: "https://shop.test/cart",
            })
            .await
            .expect_err("should error");
        match err {
            StripeError::Api { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid integer: -1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_envelope_error_body_still_produces_message() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/checkout/sessions");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = client
            .create_session(&CreateSessionRequest {
                line_items: &cart(),
                success_url: "https://shop.test/success",
                cancel_url: "https://shop.test/cart",
            })
            .await
            .expect_err("should error");
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_any_request() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/v1/")).expect("url");
        let client = client(&base);

        let items = vec![SessionLineItem {
            name: "X".to_string(),
            unit_amount: 1099,
            quantity: 0,
        }];
        let err = client
            .create_session(&CreateSessionRequest {
                line_items: &items,
                success_url: "https://shop.test/success",
                cancel_url: "https://shop.test/cart",
            })
            .await
            .expect_err("should error");
        assert!(matches!(err, StripeError::ZeroQuantity));
    }
}
