use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::cache::InfoCache;
use crate::config::Config;
use crate::crypto::CredentialCipher;
use crate::secret::{InMemorySecretStore, SecretManager};
use crate::service::{DbUserStore, SystemService, UserService};
use crate::wx::OAuthProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Login flows, permission caches and authorization
    pub users: Arc<UserService>,
    /// Menu and region trees
    pub system: Arc<SystemService>,
    /// Decrypts login credentials
    pub cipher: CredentialCipher,
}

impl AppState {
    /// Wire services on top of an open database connection
    pub fn new(
        db: DatabaseConnection,
        config: Config,
        cipher: CredentialCipher,
        oauth: Arc<dyn OAuthProvider>,
    ) -> Self {
        let secrets = SecretManager::new(
            Arc::new(InMemorySecretStore::new()),
            config.secret.key_expire(),
            config.secret.token_expire(),
        );
        let cache = Arc::new(InfoCache::new(config.cache.ttl()));
        let users = Arc::new(UserService::new(
            Arc::new(DbUserStore::new(db.clone())),
            secrets,
            cache,
            oauth,
        ));
        let system = Arc::new(SystemService::new(db.clone(), users.clone()));

        Self {
            db,
            config: Arc::new(config),
            users,
            system,
            cipher,
        }
    }

    pub fn secrets(&self) -> &SecretManager {
        self.users.secrets()
    }

    pub fn cache(&self) -> &InfoCache {
        self.users.cache()
    }
}
