use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::services::crypto::MessageCrypto;
use crate::websocket::events::EventDispatcher;
use crate::websocket::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: Arc<EventDispatcher>,
    pub crypto: Arc<dyn MessageCrypto>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Postgres>, crypto: Arc<dyn MessageCrypto>, config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(EventDispatcher::new(db.clone(), registry.clone()));
        Self {
            db,
            registry,
            dispatcher,
            crypto,
            config: Arc::new(config),
        }
    }
}
