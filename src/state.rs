use std::sync::Arc;

use anyhow::Context;

use crate::admin::{purge::PurgeTickets, token::AdminGate};
use crate::config::AppConfig;
use crate::registration::session::SessionStore;
use crate::store::StoreConnection;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: StoreConnection,
    pub sessions: Arc<SessionStore>,
    pub admin: Arc<AdminGate>,
    pub purge: Arc<PurgeTickets>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let admin = AdminGate::new(&config.admin).context("prepare admin gate")?;

        // An unreachable store does not stop the server; submissions report
        // a storage failure until it is fixed and the process restarted.
        let store = StoreConnection::connect(&config.store).await;

        Ok(Self::from_parts(config, store, admin))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: StoreConnection, admin: AdminGate) -> Self {
        Self {
            config,
            store,
            sessions: Arc::new(SessionStore::new()),
            admin: Arc::new(admin),
            purge: Arc::new(PurgeTickets::new()),
        }
    }
}

#[cfg(test)]
pub const FAKE_ADMIN_SECRET: &str = "test-secret";

#[cfg(test)]
impl AppState {
    /// In-memory store, default field rules, newest-first listing.
    pub fn fake() -> Self {
        use crate::config::{AdminConfig, ListingOrder, StoreBackend};
        use crate::registration::validators::FieldRules;
        use crate::store::MemoryStore;

        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            admin: AdminConfig {
                secret: FAKE_ADMIN_SECRET.into(),
                token_secret: "test-signing-key".into(),
                session_minutes: 5,
            },
            rules: FieldRules::default(),
            listing_order: ListingOrder::NewestFirst,
            clear_on_success: true,
        });
        let admin = AdminGate::new(&config.admin).expect("admin gate");
        let store = StoreConnection::Connected(Arc::new(MemoryStore::new()));
        Self::from_parts(config, store, admin)
    }
}
