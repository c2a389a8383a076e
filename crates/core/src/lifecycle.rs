//! Site lifecycle manager.
//!
//! [`SiteLifecycle`] creates sites from the phase catalog and applies every
//! mutation as a read-modify-write against the injected [`SiteStore`]:
//! fetch the whole document, transform it in memory (see
//! [`crate::site`]), recompute the aggregates, write the whole document
//! back. Nothing is written if any step fails.
//!
//! No lock is held between the read and the write. By default the write is
//! last-writer-wins, so two concurrent mutations of the same site can
//! silently drop the earlier one. With
//! [`LifecycleConfig::optimistic_concurrency`] enabled, the write carries the
//! version that was read and a concurrent write surfaces as
//! [`CoreError::Conflict`] instead.

use std::sync::Arc;

use chrono::Utc;

use crate::config::LifecycleConfig;
use crate::error::CoreError;
use crate::site::{NewProgressUpdate, NewSite, NewTeamMember, Site, SiteDetailsPatch};
use crate::stats::SiteScope;
use crate::store::SiteStore;
use crate::types::{EntryId, SiteId, Timestamp};

pub struct SiteLifecycle<S> {
    store: Arc<S>,
    config: LifecycleConfig,
}

impl<S> Clone for SiteLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: SiteStore> SiteLifecycle<S> {
    pub fn new(store: Arc<S>, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Load a site, failing with `NotFound` if it does not exist.
    pub async fn get_site(&self, site_id: &str) -> Result<Site, CoreError> {
        self.store
            .find_by_id(site_id)
            .await?
            .ok_or_else(|| CoreError::not_found("site", site_id))
    }

    /// The site of a client. There is one site per client by convention;
    /// if several exist the most recently created one is returned.
    pub async fn find_site_for_client(&self, client_id: &str) -> Result<Option<Site>, CoreError> {
        let sites = self
            .store
            .list(&SiteScope::Client(client_id.to_string()))
            .await?;
        Ok(sites.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // Creation and deletion
    // -----------------------------------------------------------------------

    /// Create a site for `client_id` from project template `project_id`,
    /// with the standard phases, 0% progress and `En attente` status.
    ///
    /// The client and template references are trusted; their existence is
    /// checked by the caller.
    pub async fn create_site_from_template(
        &self,
        client_id: &str,
        project_id: &str,
        input: NewSite,
        actor: &str,
    ) -> Result<SiteId, CoreError> {
        let site = Site::from_template(client_id, project_id, &input, actor, Utc::now())?;
        let stored = self.store.create(site).await?;

        tracing::info!(
            site_id = %stored.id,
            client_id,
            project_id,
            actor,
            phases = stored.phases.len(),
            "Site created"
        );
        Ok(stored.id)
    }

    pub async fn delete_site(&self, site_id: &str) -> Result<(), CoreError> {
        if !self.store.delete(site_id).await? {
            return Err(CoreError::not_found("site", site_id));
        }
        tracing::info!(site_id, "Site deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phase mutations
    // -----------------------------------------------------------------------

    /// Set a phase's progress (clamped to `[0, 100]`), derive its status and
    /// recompute the site's global progress and status.
    pub async fn update_phase_progress(
        &self,
        site_id: &str,
        phase_id: &str,
        progress: i64,
        notes: Option<String>,
        actor: &str,
    ) -> Result<(), CoreError> {
        let site = self
            .mutate(site_id, |site, now| {
                site.apply_phase_progress(phase_id, progress, notes, actor, now)
            })
            .await?
            .0;

        tracing::info!(
            site_id,
            phase_id,
            actor,
            progress = site.phase(phase_id).map(|p| p.progress),
            global_progress = site.global_progress,
            status = site.status.as_str(),
            "Phase progress updated"
        );
        Ok(())
    }

    /// Block a phase, or unblock it back to its progress-derived status.
    pub async fn set_phase_blocked(
        &self,
        site_id: &str,
        phase_id: &str,
        blocked: bool,
        actor: &str,
    ) -> Result<(), CoreError> {
        self.mutate(site_id, |site, now| {
            site.set_phase_blocked(phase_id, blocked, actor, now)
        })
        .await?;

        tracing::info!(site_id, phase_id, blocked, actor, "Phase block state changed");
        Ok(())
    }

    /// Attach a photo to a phase and record it in the site gallery.
    /// Returns the gallery entry id.
    pub async fn add_phase_photo(
        &self,
        site_id: &str,
        phase_id: &str,
        photo_url: &str,
        description: Option<String>,
        actor: &str,
    ) -> Result<EntryId, CoreError> {
        let (_, photo_id) = self
            .mutate(site_id, |site, now| {
                site.attach_phase_photo(phase_id, photo_url, description, actor, now)
            })
            .await?;

        tracing::info!(site_id, phase_id, photo_id = %photo_id, actor, "Phase photo added");
        Ok(photo_id)
    }

    // -----------------------------------------------------------------------
    // Team and feed
    // -----------------------------------------------------------------------

    pub async fn add_team_member(
        &self,
        site_id: &str,
        member: NewTeamMember,
        actor: &str,
    ) -> Result<EntryId, CoreError> {
        let (_, member_id) = self
            .mutate(site_id, |site, now| site.add_team_member(member, actor, now))
            .await?;

        tracing::info!(site_id, member_id = %member_id, actor, "Team member added");
        Ok(member_id)
    }

    pub async fn remove_team_member(&self, site_id: &str, member_id: &str) -> Result<(), CoreError> {
        self.mutate(site_id, |site, now| site.remove_team_member(member_id, now))
            .await?;

        tracing::info!(site_id, member_id, "Team member removed");
        Ok(())
    }

    /// Prepend an entry to the site's update feed. Returns the entry id.
    pub async fn add_progress_update(
        &self,
        site_id: &str,
        update: NewProgressUpdate,
        actor: &str,
    ) -> Result<EntryId, CoreError> {
        let (_, update_id) = self
            .mutate(site_id, |site, now| site.prepend_update(update, actor, now))
            .await?;

        tracing::info!(site_id, update_id = %update_id, actor, "Progress update added");
        Ok(update_id)
    }

    // -----------------------------------------------------------------------
    // Site details and status
    // -----------------------------------------------------------------------

    pub async fn update_site_details(
        &self,
        site_id: &str,
        patch: SiteDetailsPatch,
        actor: &str,
    ) -> Result<(), CoreError> {
        let (site, _) = self
            .mutate(site_id, |site, now| site.apply_details(patch, now))
            .await?;

        tracing::info!(site_id, actor, status = site.status.as_str(), "Site details updated");
        Ok(())
    }

    /// Recompute a site's status against the current time. Writes only when
    /// the status changed; returns whether it did.
    pub async fn refresh_status(&self, site_id: &str) -> Result<bool, CoreError> {
        let site = self.get_site(site_id).await?;
        self.refresh_loaded(site, Utc::now()).await
    }

    /// Refresh the status of every site in `scope`. Returns how many sites
    /// changed status.
    ///
    /// A site deleted or rewritten by someone else since the listing is
    /// skipped; any other store error aborts the pass.
    pub async fn refresh_statuses(&self, scope: &SiteScope) -> Result<usize, CoreError> {
        let now = Utc::now();
        let mut changed = 0;
        for site in self.store.list(scope).await? {
            let site_id = site.id.clone();
            match self.refresh_loaded(site, now).await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e @ (CoreError::NotFound { .. } | CoreError::Conflict(_))) => {
                    tracing::warn!(site_id = %site_id, error = %e, "Skipping site during status refresh");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(changed)
    }

    async fn refresh_loaded(&self, mut site: Site, now: Timestamp) -> Result<bool, CoreError> {
        let current = site.current_status(now);
        if current == site.status {
            return Ok(false);
        }
        let previous = site.status;
        let expected = self.expected_version(&site);
        site.recompute(now);
        self.store.replace(&site, expected).await?;

        tracing::info!(
            site_id = %site.id,
            from = previous.as_str(),
            to = site.status.as_str(),
            "Site status refreshed"
        );
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Read-modify-write
    // -----------------------------------------------------------------------

    /// Load `site_id`, apply `op` as of a single `now`, and write the whole
    /// document back. Returns the stored site and `op`'s output.
    async fn mutate<T, F>(&self, site_id: &str, op: F) -> Result<(Site, T), CoreError>
    where
        F: FnOnce(&mut Site, Timestamp) -> Result<T, CoreError> + Send,
    {
        let mut site = self.get_site(site_id).await?;
        let expected = self.expected_version(&site);

        let output = op(&mut site, Utc::now())?;
        let stored = self.store.replace(&site, expected).await?;
        Ok((stored, output))
    }

    fn expected_version(&self, site: &Site) -> Option<i64> {
        self.config.optimistic_concurrency.then_some(site.version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
