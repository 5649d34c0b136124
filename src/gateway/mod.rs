//! Payment gateway abstraction
//!
//! The settlement engine talks to the gateway through [`PaymentGateway`] so
//! the production Stripe client and the in-process mock are interchangeable.

pub mod mock;
pub mod stripe;

pub use mock::MockGateway;
pub use stripe::StripeGateway;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Everything the gateway needs to open a payment intent. The metadata
/// fields travel to the gateway so its dashboard and webhooks can be traced
/// back to the sale.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub buyer_id: String,
    pub event_id: Uuid,
    pub quantity: i32,
    pub event_title: String,
}

/// A freshly opened intent: `id` becomes the attempt's gateway reference,
/// `client_secret` goes back to the buyer's browser.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Gateway-side status of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresAction,
    Canceled,
    Unknown,
}

impl IntentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_action" | "requires_confirmation" => Self::RequiresAction,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresAction => "requires_action",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected request: {0}")]
    Api(String),
    #[error("payment intent not found: {0}")]
    IntentNotFound(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment intent. Nothing is persisted on our side until this
    /// returns, so a failure here leaves no partial state.
    async fn create_intent(&self, req: &IntentRequest) -> Result<PaymentIntent, GatewayError>;

    /// Ask the gateway for the current status of an intent (the synchronous
    /// confirmation path, used instead of waiting for the webhook).
    async fn retrieve_intent(&self, reference: &str) -> Result<IntentStatus, GatewayError>;
}
