use std::time::Duration;

use forge::prelude::*;
use sqlx::PgPool;

use crate::services::{VideoProvider, list_processing_videos, poll};

const SWEEP_BATCH: i64 = 20;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Polls videos that have been processing for at least `min_age` through
/// the pull path. Returns how many were polled successfully.
pub async fn sweep_tick(
    db: &PgPool,
    provider: &dyn VideoProvider,
    min_age: Duration,
) -> crate::error::Result<u32> {
    let cutoff = chrono::Utc::now()
        - chrono::Duration::from_std(min_age).unwrap_or_else(|_| chrono::Duration::zero());
    let pending = list_processing_videos(db, cutoff, SWEEP_BATCH).await?;

    if pending.is_empty() {
        return Ok(0);
    }

    tracing::debug!(count = pending.len(), "sweeper: polling processing videos");

    let mut polled = 0u32;
    for video in &pending {
        match poll(db, provider, &video.external_id).await {
            Ok(result) => {
                polled += 1;
                if result.status.is_terminal() {
                    tracing::info!(
                        video_id = %video.external_id,
                        status = %result.status,
                        "sweeper: video finished"
                    );
                }
            }
            // keep going, the next tick retries it
            Err(e) => {
                tracing::warn!(
                    video_id = %video.external_id,
                    error = %e,
                    "sweeper: status poll failed"
                );
            }
        }
    }

    Ok(polled)
}

/// `STATUS_SWEEP_INTERVAL_SECS=0` turns the sweeper off.
#[forge::daemon]
pub async fn status_sweeper(ctx: &DaemonContext) -> Result<()> {
    let interval_secs: u64 = ctx
        .env_parse("STATUS_SWEEP_INTERVAL_SECS")
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

    if interval_secs == 0 {
        tracing::info!("status sweeper disabled");
        ctx.shutdown_signal().await;
        return Ok(());
    }

    let interval = Duration::from_secs(interval_secs);
    tracing::info!(interval_secs, "status sweeper started");

    loop {
        tokio::select! {
            _ = ctx.shutdown_signal() => break,
            _ = tokio::time::sleep(interval) => {
                let provider = match crate::get_video_provider() {
                    Ok(provider) => provider,
                    Err(e) => {
                        tracing::error!(error = %e, "sweeper: no video provider");
                        continue;
                    }
                };
                match sweep_tick(ctx.db(), provider.as_ref(), interval).await {
                    Ok(n) if n > 0 => tracing::info!(polled = n, "sweeper tick"),
                    Err(e) => tracing::error!(error = %e, "sweeper tick failed"),
                    _ => {}
                }
            }
        }
    }

    tracing::info!("status sweeper stopped");
    Ok(())
}
