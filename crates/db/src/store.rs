//! [`SiteStore`] implementation on PostgreSQL.

use chantier_core::store::DEFAULT_CHANGE_CAPACITY;
use chantier_core::{CoreError, Site, SiteChange, SiteScope, SiteStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::listener::{self, SITE_CHANGES_CHANNEL};
use crate::models::site::{to_document, SiteRow};
use crate::repositories::site_repo::{ReplaceOutcome, SiteRepo};
use crate::{store_error, DbPool};

/// Site documents in the `sites` table.
///
/// Change notifications come from the database trigger, not from this
/// process, so writes made by other processes reach [`SiteStore::changes`]
/// subscribers too. They only flow once [`PgSiteStore::spawn_listener`] has
/// been called.
pub struct PgSiteStore {
    pool: DbPool,
    sender: broadcast::Sender<SiteChange>,
}

impl PgSiteStore {
    pub fn new(pool: DbPool) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);
        Self { pool, sender }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Start forwarding `site_changes` notifications to subscribers. The
    /// task reconnects on its own and stops when `cancel` fires.
    pub fn spawn_listener(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(listener::run(
            self.pool.clone(),
            SITE_CHANGES_CHANNEL,
            self.sender.clone(),
            cancel,
        ))
    }
}

fn decode_all(rows: Vec<SiteRow>) -> Result<Vec<Site>, CoreError> {
    rows.into_iter().map(SiteRow::into_site).collect()
}

impl SiteStore for PgSiteStore {
    async fn create(&self, site: Site) -> Result<Site, CoreError> {
        let document = to_document(&site)?;
        SiteRepo::create(&self.pool, &site.client_id, site.chef_id.as_deref(), &document)
            .await
            .map_err(store_error)?
            .into_site()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Site>, CoreError> {
        SiteRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)?
            .map(SiteRow::into_site)
            .transpose()
    }

    async fn list(&self, scope: &SiteScope) -> Result<Vec<Site>, CoreError> {
        let rows = match scope {
            SiteScope::All => SiteRepo::list(&self.pool).await,
            SiteScope::Chef(chef_id) => SiteRepo::list_by_chef(&self.pool, chef_id).await,
            SiteScope::Client(client_id) => SiteRepo::list_by_client(&self.pool, client_id).await,
        }
        .map_err(store_error)?;
        decode_all(rows)
    }

    async fn replace(&self, site: &Site, expected_version: Option<i64>) -> Result<Site, CoreError> {
        let document = to_document(site)?;
        let outcome = SiteRepo::replace(
            &self.pool,
            &site.id,
            &site.client_id,
            site.chef_id.as_deref(),
            &document,
            expected_version,
        )
        .await
        .map_err(store_error)?;

        match outcome {
            ReplaceOutcome::Replaced(row) => row.into_site(),
            ReplaceOutcome::VersionMismatch { actual } => Err(CoreError::Conflict(format!(
                "site {} is at version {actual}, expected {}",
                site.id,
                expected_version.unwrap_or_default()
            ))),
            ReplaceOutcome::Missing => Err(CoreError::not_found("site", site.id.as_str())),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        SiteRepo::delete(&self.pool, id).await.map_err(store_error)
    }

    fn changes(&self) -> broadcast::Receiver<SiteChange> {
        self.sender.subscribe()
    }
}
