//! Application state for boxoffice

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::gateway::{PaymentGateway, StripeGateway};
use crate::settlement::Settlement;
use crate::store::{PgStore, Store};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage for events and payment attempts
    pub store: Arc<dyn Store>,
    /// The settlement engine (holds the store and the gateway client)
    pub settlement: Settlement,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
}

impl AppState {
    /// Create production state: Postgres store + Stripe gateway.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(StripeGateway::new(&config.stripe_secret_key));

        Ok(Self::with_parts(
            store,
            gateway,
            &config.currency,
            &config.stripe_webhook_secret,
        ))
    }

    /// Assemble state from explicit collaborators. Tests pass the in-memory
    /// store and the mock gateway here.
    pub fn with_parts(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        currency: &str,
        webhook_secret: &str,
    ) -> Self {
        Self {
            settlement: Settlement::new(store.clone(), gateway, currency),
            store,
            stripe_webhook_secret: webhook_secret.to_string(),
        }
    }
}
