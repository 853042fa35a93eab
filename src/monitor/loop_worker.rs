use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::MonitorContext;
use crate::capture;
use crate::capture::encode::{self, EncodedCapture, ImageMime};
use crate::{log_debug, log_error, log_info, log_warn};

// Set to false to silence the per-tick log lines in this module
const ENABLE_LOGS: bool = true;

/// What one capture tick did. Skips are normal operation, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The previous tick is still in flight.
    SkippedBusy,
    /// The cached clock state says the user is not clocked in.
    SkippedNotClockedIn,
    /// No auth token is present; nobody is signed in.
    SkippedNoToken,
    /// The OS reported no capture sources.
    SkippedNoSources,
    Uploaded {
        mime: ImageMime,
        path: String,
    },
    /// The upload failed and was recorded to the failure ring.
    UploadFailed {
        error: String,
    },
}

pub(crate) async fn capture_loop(ctx: Arc<MonitorContext>, cancel: CancellationToken) {
    let mut ticker = time::interval(ctx.capture_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Ticks run detached so a slow upload cannot push the
                // schedule; the in-flight guard skips the overlap instead.
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    match run_tick(&ctx).await {
                        Ok(TickOutcome::SkippedBusy) => {
                            log_warn!("previous capture tick still in flight, skipping this one");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            log_error!("capture tick failed: {err:#}");
                        }
                    }
                });
            }
            _ = cancel.cancelled() => {
                log_info!("capture loop shutting down");
                break;
            }
        }
    }
}

/// One pass of the capture pipeline: staleness guard, gate, capture,
/// encode, upload, failure bookkeeping.
pub(crate) async fn run_tick(ctx: &MonitorContext) -> Result<TickOutcome> {
    if ctx.tick_in_flight.swap(true, Ordering::SeqCst) {
        return Ok(TickOutcome::SkippedBusy);
    }
    let outcome = tick_inner(ctx).await;
    ctx.tick_in_flight.store(false, Ordering::SeqCst);
    outcome
}

async fn tick_inner(ctx: &MonitorContext) -> Result<TickOutcome> {
    let tick_start = Instant::now();

    // Self-heal after timer drift or resume from sleep: a stale cache must
    // be refreshed before it gates anything.
    if ctx.clock.is_stale().await {
        log_debug!("clock state stale, refreshing before the capture decision");
        ctx.clock.refresh().await;
    }

    if !ctx.clock.snapshot().await.is_clocked_in {
        log_debug!("not clocked in, skipping capture tick");
        return Ok(TickOutcome::SkippedNotClockedIn);
    }

    // Re-read the token every tick; login and logout happen between ticks.
    let token = match ctx.store.auth_token().await? {
        Some(token) if !token.is_empty() => token,
        _ => {
            log_debug!("no auth token, skipping capture tick");
            return Ok(TickOutcome::SkippedNoToken);
        }
    };

    let displays = match ctx.backend.list_displays() {
        Ok(displays) => displays,
        Err(err) => {
            log_warn!("display enumeration failed, skipping capture tick: {err}");
            return Ok(TickOutcome::SkippedNoSources);
        }
    };
    let Some(display) = capture::select_display(&displays) else {
        log_warn!("no capture sources available, skipping capture tick");
        return Ok(TickOutcome::SkippedNoSources);
    };

    let max_dimensions = capture::target_dimensions(display);
    let display_id = display.id.clone();
    let captured_at_ms = Utc::now().timestamp_millis();

    let backend = Arc::clone(&ctx.backend);
    let capture_start = Instant::now();
    let encoded: EncodedCapture = tokio::task::spawn_blocking(move || -> Result<EncodedCapture> {
        let frame = backend.capture_display(&display_id, captured_at_ms)?;
        encode::encode_frame(&frame, Some(max_dimensions))
    })
    .await
    .context("capture worker join failed")??;
    let capture_duration_ms = capture_start.elapsed().as_millis();

    let payload = crate::api::ScreenshotPayload::new(encoded.to_data_uri(), encoded.captured_at_ms);

    match ctx.api.upload_screenshot(&token, &payload).await {
        Ok(response) => {
            log_info!(
                "screenshot uploaded to {} ({} {} bytes, capture {}ms, total {}ms)",
                response.path,
                encoded.mime.as_str(),
                encoded.bytes.len(),
                capture_duration_ms,
                tick_start.elapsed().as_millis()
            );
            Ok(TickOutcome::Uploaded {
                mime: encoded.mime,
                path: response.path,
            })
        }
        Err(err) => {
            let message = format!("{err:#}");
            if let Err(store_err) = ctx
                .store
                .record_upload_failure(Utc::now().timestamp_millis(), &message)
                .await
            {
                log_error!("failed to record upload failure: {store_err:#}");
            }
            log_error!("screenshot upload failed: {message}");
            Ok(TickOutcome::UploadFailed { error: message })
        }
    }
}
