//! Backing-store seams.
//!
//! The lifecycle manager, the directory view model and the name resolver
//! never reach for a global store; they are handed an implementation of
//! [`SiteStore`] or [`UserLookup`]. `chantier-db` provides the PostgreSQL
//! implementations and [`crate::memory`] the in-process ones.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::site::Site;
use crate::stats::SiteScope;
use crate::types::SiteId;

/// Default buffer capacity for site change channels.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Notification that a site document changed in the store.
///
/// Receivers are expected to reload rather than patch local state, so a
/// missed or duplicated notification is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "id")]
pub enum SiteChange {
    Created(SiteId),
    Updated(SiteId),
    Deleted(SiteId),
    /// The change feed may have dropped notifications (e.g. after a
    /// reconnect); every view should reload.
    Resync,
}

impl SiteChange {
    /// The affected site, or `None` for [`SiteChange::Resync`].
    pub fn site_id(&self) -> Option<&str> {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Deleted(id) => Some(id),
            Self::Resync => None,
        }
    }

    /// Whether a view of `site_id` must reload after this change.
    pub fn affects(&self, site_id: &str) -> bool {
        self.site_id().map_or(true, |id| id == site_id)
    }
}

/// Document store holding whole site documents.
pub trait SiteStore: Send + Sync {
    /// Persist a new site. The store assigns `id` and `version` (any values
    /// already set on `site` are ignored) and returns the stored document.
    fn create(&self, site: Site) -> impl Future<Output = Result<Site, CoreError>> + Send;

    fn find_by_id(&self, id: &str) -> impl Future<Output = Result<Option<Site>, CoreError>> + Send;

    /// All sites in `scope`, most recently created first.
    fn list(&self, scope: &SiteScope) -> impl Future<Output = Result<Vec<Site>, CoreError>> + Send;

    /// Overwrite a whole site document.
    ///
    /// With `expected_version` set, the write fails with
    /// [`CoreError::Conflict`] unless the stored version matches. With
    /// `None` the last writer wins. Fails with [`CoreError::NotFound`] if the
    /// site no longer exists. Returns the stored document with its new
    /// version.
    fn replace(
        &self,
        site: &Site,
        expected_version: Option<i64>,
    ) -> impl Future<Output = Result<Site, CoreError>> + Send;

    /// Delete a site. Returns `true` if a document was removed.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool, CoreError>> + Send;

    /// Subscribe to change notifications for every site in the store.
    fn changes(&self) -> broadcast::Receiver<SiteChange>;
}

/// Source of user display names.
pub trait UserLookup: Send + Sync {
    /// Display name of a user, or `None` if no such user exists.
    fn display_name(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<String>, CoreError>> + Send;
}
