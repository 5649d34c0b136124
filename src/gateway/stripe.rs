//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{GatewayError, IntentRequest, IntentStatus, PaymentGateway, PaymentIntent};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Reject webhook events older than 5 minutes to prevent replay attacks.
const REPLAY_WINDOW_SECS: i64 = 300;

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, req: &IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let params = [
            ("amount", req.amount_cents.to_string()),
            ("currency", req.currency.clone()),
            ("metadata[buyer_id]", req.buyer_id.clone()),
            ("metadata[event_id]", req.event_id.to_string()),
            ("metadata[quantity]", req.quantity.to_string()),
            ("metadata[event_title]", req.event_title.clone()),
        ];

        let resp: serde_json::Value = self
            .client
            .post(format!("{API_BASE}/payment_intents"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["client_secret"].as_str()) {
            (Some(id), Some(client_secret)) => Ok(PaymentIntent {
                id: id.to_string(),
                client_secret: client_secret.to_string(),
            }),
            _ => Err(api_error(&resp, "create payment intent")),
        }
    }

    async fn retrieve_intent(&self, reference: &str) -> Result<IntentStatus, GatewayError> {
        let resp: serde_json::Value = self
            .client
            .get(format!("{API_BASE}/payment_intents/{reference}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;

        if resp["error"]["code"].as_str() == Some("resource_missing") {
            return Err(GatewayError::IntentNotFound(reference.to_string()));
        }
        match resp["status"].as_str() {
            Some(status) => Ok(IntentStatus::parse(status)),
            None => Err(api_error(&resp, "retrieve payment intent")),
        }
    }
}

fn api_error(resp: &serde_json::Value, op: &str) -> GatewayError {
    let detail = resp["error"]["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| resp.to_string());
    GatewayError::Api(format!("{op}: {detail}"))
}

/// Verify a Stripe webhook signature (HMAC-SHA256)
///
/// The `Stripe-Signature` header carries `t=<unix seconds>,v1=<hex hmac>`;
/// the signature covers `"{t}.{raw body}"` with the endpoint's shared secret.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("malformed Stripe-Signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Decode hex signature and compare in constant time via verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "signature is not valid hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "webhook signature mismatch")?;

    let ts: i64 = timestamp.parse().map_err(|_| "invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > REPLAY_WINDOW_SECS {
        return Err("webhook timestamp outside tolerance");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(payload));
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, SECRET, chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, SECRET).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, "wrong_secret", chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, SECRET).is_err());
    }

    #[test]
    fn test_modified_payload_rejected() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, SECRET, chrono::Utc::now().timestamp());
        let tampered = br#"{"type":"payment_intent.payment_failed"}"#;
        assert!(verify_webhook_signature(tampered, &header, SECRET).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        // 10 minutes ago, beyond the 5-minute tolerance
        let header = sign(payload, SECRET, chrono::Utc::now().timestamp() - 600);
        assert_eq!(
            verify_webhook_signature(payload, &header, SECRET),
            Err("webhook timestamp outside tolerance")
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        let payload = b"{}";
        assert!(verify_webhook_signature(payload, "", SECRET).is_err());
        assert!(verify_webhook_signature(payload, "t=123", SECRET).is_err());
        assert!(verify_webhook_signature(payload, "v1=abcdef", SECRET).is_err());
        assert!(verify_webhook_signature(payload, "t=123,v1=nothex", SECRET).is_err());
    }

    #[test]
    fn test_intent_status_parse() {
        assert_eq!(IntentStatus::parse("succeeded"), IntentStatus::Succeeded);
        assert_eq!(IntentStatus::parse("processing"), IntentStatus::Processing);
        assert_eq!(
            IntentStatus::parse("requires_payment_method"),
            IntentStatus::RequiresPaymentMethod
        );
        assert_eq!(IntentStatus::parse("whatever"), IntentStatus::Unknown);
    }
}
