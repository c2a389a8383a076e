//! LISTEN/NOTIFY bridge from the `sites` trigger to a broadcast channel.
//!
//! The loop owns one dedicated connection. When the connection drops,
//! notifications sent in the meantime are lost, so every (re)connect is
//! followed by a [`SiteChange::Resync`] telling views to reload. The
//! Resync is only sent once LISTEN is active on the new connection.

use std::time::Duration;

use chantier_core::SiteChange;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::DbPool;

/// Channel the `notify_site_change` trigger publishes on.
pub const SITE_CHANGES_CHANNEL: &str = "site_changes";

/// First delay before retrying a failed connect.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for the reconnect delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Trigger payload: `{"op": "insert" | "update" | "delete", "id": "..."}`.
#[derive(Debug, Deserialize)]
struct NotifyPayload {
    op: String,
    id: String,
}

/// Parse a trigger payload into a change. Unknown payloads yield `None`.
pub fn parse_notification(payload: &str) -> Option<SiteChange> {
    let parsed: NotifyPayload = serde_json::from_str(payload).ok()?;
    match parsed.op.as_str() {
        "insert" => Some(SiteChange::Created(parsed.id)),
        "update" => Some(SiteChange::Updated(parsed.id)),
        "delete" => Some(SiteChange::Deleted(parsed.id)),
        _ => None,
    }
}

async fn connect(pool: &DbPool, channel: &str) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(channel).await?;
    Ok(listener)
}

/// Run the listener until `cancel` fires.
pub async fn run(
    pool: DbPool,
    channel: &'static str,
    sender: broadcast::Sender<SiteChange>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let mut listener = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect(&pool, channel) => match result {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, retry_in_ms = backoff.as_millis() as u64, "Site change listener failed to connect");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            },
        };

        backoff = INITIAL_BACKOFF;
        tracing::info!(channel, "Listening for site changes");
        let _ = sender.send(SiteChange::Resync);

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(channel, "Site change listener stopped");
                    return;
                }
                received = listener.try_recv() => received,
            };

            match received {
                Ok(Some(notification)) => match parse_notification(notification.payload()) {
                    Some(change) => {
                        let _ = sender.send(change);
                    }
                    None => {
                        tracing::warn!(payload = notification.payload(), "Ignoring unrecognized site notification");
                    }
                },
                Ok(None) => {
                    // LISTEN is not active again until connect() succeeds, so
                    // the Resync waits for the outer loop.
                    tracing::warn!(channel, "Site change listener connection lost, reconnecting");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Site change listener failed, reconnecting");
                    break;
                }
            }
        }
    }

    tracing::info!(channel, "Site change listener stopped");
}
