//! Live site lists driven by the store's change feed.
//!
//! Each subscription owns a background task that loads its view once, then
//! reloads it whenever a relevant [`SiteChange`] arrives and hands the whole
//! result to the callback. Bursts of changes are coalesced into one reload.
//! Statistics are recomputed from the list on every emission. After a
//! failed reload the task also retries on a capped backoff timer, so a view
//! heals once the store is back even if nothing is written.

use std::sync::Arc;
use std::time::Duration;

use chantier_core::{CoreError, Site, SiteChange, SiteScope, SiteStats, SiteStore};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::subscription::Subscription;

/// Delay before the first retry after a failed reload.
const INITIAL_RETRY: Duration = Duration::from_millis(250);

/// Upper bound for the retry delay while the store keeps failing.
const MAX_RETRY: Duration = Duration::from_secs(30);

fn next_retry(previous: Option<Duration>) -> Duration {
    previous.map_or(INITIAL_RETRY, |delay| (delay * 2).min(MAX_RETRY))
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Everything a list view needs after one reload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    /// Sites in scope, newest first.
    pub sites: Vec<Site>,
    pub stats: SiteStats,
    /// Set when the latest reload failed; `sites` then holds the last
    /// successfully loaded list.
    pub error: Option<String>,
}

impl DirectorySnapshot {
    fn new(sites: Vec<Site>, error: Option<String>) -> Self {
        let stats = SiteStats::from_sites(&sites, Utc::now());
        Self {
            sites,
            stats,
            error,
        }
    }
}

/// State of a single watched site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSnapshot {
    /// `None` once the site does not exist.
    pub site: Option<Site>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// SiteDirectory
// ---------------------------------------------------------------------------

pub struct SiteDirectory<S> {
    store: Arc<S>,
}

impl<S> Clone for SiteDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SiteStore + 'static> SiteDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One-off load of the sites in `scope` with their statistics.
    pub async fn snapshot(&self, scope: &SiteScope) -> Result<DirectorySnapshot, CoreError> {
        let sites = self.store.list(scope).await?;
        Ok(DirectorySnapshot::new(sites, None))
    }

    /// Watch every site in `scope`.
    ///
    /// `callback` runs once with the initial list and again after every
    /// change to the store. A failed reload is reported through
    /// [`DirectorySnapshot::error`] and the subscription keeps listening.
    pub fn subscribe_all<F>(&self, scope: SiteScope, mut callback: F) -> Subscription
    where
        F: FnMut(DirectorySnapshot) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        // Subscribe before the first load so no change slips in between.
        let mut changes = store.changes();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut last_sites = Vec::new();
            let mut retry = None;
            loop {
                let snapshot = match store.list(&scope).await {
                    Ok(sites) => {
                        tracing::debug!(?scope, count = sites.len(), "Site directory reloaded");
                        last_sites = sites;
                        retry = None;
                        DirectorySnapshot::new(last_sites.clone(), None)
                    }
                    Err(e) => {
                        tracing::error!(?scope, error = %e, "Site directory reload failed");
                        retry = Some(next_retry(retry));
                        DirectorySnapshot::new(last_sites.clone(), Some(e.to_string()))
                    }
                };

                if token.is_cancelled() {
                    break;
                }
                callback(snapshot);

                // Membership can change on any write (e.g. a chef reassignment),
                // so every change triggers a reload.
                if !wait_for_change(&mut changes, &token, retry, |_| true).await {
                    break;
                }
            }
            tracing::debug!(?scope, "Site directory subscription ended");
        });

        Subscription::new(cancel, handle)
    }

    /// Watch a single site. The callback receives `site: None` when the
    /// site does not exist or has been deleted.
    pub fn subscribe_one<F>(&self, site_id: impl Into<String>, mut callback: F) -> Subscription
    where
        F: FnMut(SiteSnapshot) + Send + 'static,
    {
        let site_id: String = site_id.into();
        let store = Arc::clone(&self.store);
        let mut changes = store.changes();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut last_site = None;
            let mut retry = None;
            loop {
                let snapshot = match store.find_by_id(&site_id).await {
                    Ok(site) => {
                        tracing::debug!(site_id = %site_id, found = site.is_some(), "Site reloaded");
                        last_site = site;
                        retry = None;
                        SiteSnapshot {
                            site: last_site.clone(),
                            error: None,
                        }
                    }
                    Err(e) => {
                        tracing::error!(site_id = %site_id, error = %e, "Site reload failed");
                        retry = Some(next_retry(retry));
                        SiteSnapshot {
                            site: last_site.clone(),
                            error: Some(e.to_string()),
                        }
                    }
                };

                if token.is_cancelled() {
                    break;
                }
                callback(snapshot);

                let relevant = |change: &SiteChange| change.affects(&site_id);
                if !wait_for_change(&mut changes, &token, retry, relevant).await {
                    break;
                }
            }
            tracing::debug!(site_id = %site_id, "Site subscription ended");
        });

        Subscription::new(cancel, handle)
    }
}

/// Block until a change accepted by `relevant` arrives, then drain whatever
/// else is already queued. With `retry` set, also return once that delay
/// has elapsed.
///
/// Returns `false` when the subscription should end: cancelled, or the
/// store dropped its change sender.
async fn wait_for_change(
    changes: &mut broadcast::Receiver<SiteChange>,
    cancel: &CancellationToken,
    retry: Option<Duration>,
    relevant: impl Fn(&SiteChange) -> bool,
) -> bool {
    let retry_timer = async {
        match retry {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(retry_timer);

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = &mut retry_timer => {
                tracing::debug!(?retry, "Retrying failed reload");
                return true;
            }
            received = changes.recv() => received,
        };

        match received {
            Ok(change) if relevant(&change) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Site change feed lagged, reloading");
                break;
            }
            Err(RecvError::Closed) => {
                tracing::info!("Site change feed closed, subscription shutting down");
                return false;
            }
        }
    }

    // Coalesce the burst; the reload will observe all of it.
    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
