//! Background jobs

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::secret::SecretManager;

/// Periodically drop expired keys and tokens
pub fn spawn_secret_sweeper(secrets: SecretManager, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (keys, tokens) = secrets.clear_expired();
            if keys > 0 || tokens > 0 {
                tracing::info!("Cleared {} expired key(s) and {} token(s)", keys, tokens);
            }
        }
    })
}
