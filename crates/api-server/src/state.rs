use std::sync::Arc;

use market_data::MarketDataStore;
use session_manager::SessionManager;
use user_store::UserStore;

use crate::config::ServerConfig;

/// Shared handles threaded into every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserStore>,
    pub market_data: Arc<MarketDataStore>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let market_data = Arc::new(MarketDataStore::new(&config.data_dir));
        let sessions = Arc::new(SessionManager::new(market_data.clone(), &config.users_dir));
        let users = Arc::new(UserStore::new(&config.users_dir));
        Self {
            sessions,
            users,
            market_data,
        }
    }
}
