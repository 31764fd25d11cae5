//! Periodic removal of expired session rows.
//!
//! Validation already rejects expired sessions on its own; this only bounds table growth.

use anyhow::Result;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::store::IdentityStore;

/// Run one pass and return the number of rows deleted.
///
/// # Errors
/// Propagates store failures.
pub async fn sweep_once(store: &dyn IdentityStore) -> Result<u64> {
    let removed = store.delete_expired_sessions(Utc::now()).await?;
    if removed > 0 {
        info!(removed, "expired student sessions removed");
    } else {
        debug!("no expired student sessions");
    }
    Ok(removed)
}

/// Spawn the sweeper loop. Returns `None` when `interval` is zero (disabled).
pub fn spawn_session_sweeper(
    store: Arc<dyn IdentityStore>,
    interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        info!("session sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            sleep(interval).await;
            if let Err(err) = sweep_once(store.as_ref()).await {
                error!("session sweep failed: {err:#}");
            }
        }
    }))
}
