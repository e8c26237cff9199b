// src/services/expiry.rs

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::{
    error::AppError,
    services::session::{self, Phase},
    state::AppState,
    store::Store,
};

/// Force-submits every running session whose deadline has passed.
///
/// Returns how many results were created. A session that fails to submit is
/// logged and left running so the next sweep retries it.
pub async fn sweep_expired(store: &dyn Store, now: DateTime<Utc>) -> Result<usize, AppError> {
    let expired = store.expired_sessions(now).await?;
    let mut submitted = 0;

    for s in &expired {
        if Phase::from_session(s).tick(now).is_none() {
            continue;
        }
        match session::force_submit(store, s, now).await {
            Ok(Some(_)) => submitted += 1,
            Ok(None) => {}
            Err(e) => tracing::warn!("Forced submission of session {} failed: {}", s.id, e),
        }
    }

    if submitted > 0 {
        tracing::info!("Expiry sweep submitted {} session(s)", submitted);
    }
    Ok(submitted)
}

/// Runs [`sweep_expired`] on the configured interval until the process exits.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.expiry_sweep_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = sweep_expired(state.store.as_ref(), Utc::now()).await {
                tracing::error!("Expiry sweep failed: {}", e);
            }
        }
    })
}
