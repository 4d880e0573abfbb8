pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod notifications;

pub use db::DbPool;

use std::sync::Arc;

use api::rate_limit::RateLimiter;
use auth::SqlIdentityAdapter;
use config::Config;
use db::IdentityStore;
use notifications::Mailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub store: IdentityStore,
    pub adapter: SqlIdentityAdapter,
    pub mailer: Mailer,
    pub http: reqwest::Client,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let store = IdentityStore::new(db.clone());
        let adapter = SqlIdentityAdapter::new(store.clone());
        let mailer = Mailer::new(config.email.clone());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            db,
            store,
            adapter,
            mailer,
            http: reqwest::Client::new(),
            rate_limiter,
        }
    }
}
