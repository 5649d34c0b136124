//! In-process gateway for tests and offline development
//!
//! Opens intents without touching the network and lets callers script each
//! intent's status, so the synchronous confirmation path and failure modes
//! can be exercised deterministically.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::{GatewayError, IntentRequest, IntentStatus, PaymentGateway, PaymentIntent};

#[derive(Default)]
pub struct MockGateway {
    intents: Mutex<HashMap<String, IntentStatus>>,
    fail_create: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_intent` calls fail, simulating an outage.
    pub fn set_create_failure(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Script the status the gateway reports for an intent.
    pub fn set_status(&self, reference: &str, status: IntentStatus) {
        self.intents
            .lock()
            .unwrap()
            .insert(reference.to_string(), status);
    }

    pub fn mark_succeeded(&self, reference: &str) {
        self.set_status(reference, IntentStatus::Succeeded);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(&self, _req: &IntentRequest) -> Result<PaymentIntent, GatewayError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Api("simulated gateway outage".to_string()));
        }
        let id = format!("pi_{}", Uuid::new_v4().simple());
        self.intents
            .lock()
            .unwrap()
            .insert(id.clone(), IntentStatus::RequiresPaymentMethod);
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }

    async fn retrieve_intent(&self, reference: &str) -> Result<IntentStatus, GatewayError> {
        self.intents
            .lock()
            .unwrap()
            .get(reference)
            .copied()
            .ok_or_else(|| GatewayError::IntentNotFound(reference.to_string()))
    }
}
