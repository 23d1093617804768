use crate::api::middleware::rate_limit::RateLimiter;
use crate::services::auth_service::AuthService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

pub struct BackgroundWorker {
    auth: Arc<AuthService>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        auth: Arc<AuthService>,
        limiter: Arc<RateLimiter>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            auth,
            limiter,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    pub async fn perform_cleanup(&self) {
        tracing::debug!("🧹 Running background cleanup tasks...");

        match self.auth.purge_expired_sessions().await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Purged {} expired sessions", n),
            Err(e) => tracing::error!("Failed to purge expired sessions: {}", e),
        }

        let pruned = self.limiter.prune();
        if pruned > 0 {
            tracing::debug!("Dropped {} stale rate-limit windows", pruned);
        }
    }
}
