//! In-process store implementations.
//!
//! [`MemorySiteStore`] keeps site documents in a `RwLock`ed vector and
//! publishes [`SiteChange`]s on a broadcast channel, giving the same push
//! semantics as the PostgreSQL store without a database. Used by tests and
//! by embedders that do not need durability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{broadcast, RwLock};

use crate::error::CoreError;
use crate::site::Site;
use crate::stats::SiteScope;
use crate::store::{SiteChange, SiteStore, UserLookup, DEFAULT_CHANGE_CAPACITY};
use crate::types::UserId;

// ---------------------------------------------------------------------------
// MemorySiteStore
// ---------------------------------------------------------------------------

pub struct MemorySiteStore {
    /// Insertion order, oldest first.
    sites: RwLock<Vec<Site>>,
    sender: broadcast::Sender<SiteChange>,
    offline: AtomicBool,
}

impl MemorySiteStore {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);
        Self {
            sites: RwLock::new(Vec::new()),
            sender,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an unreachable store: while offline every operation fails
    /// with [`CoreError::TransientStore`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Publish a change without touching any document.
    pub fn notify(&self, change: SiteChange) {
        // Zero receivers is not an error.
        let _ = self.sender.send(change);
    }

    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sites.read().await.is_empty()
    }

    fn check_online(&self) -> Result<(), CoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CoreError::TransientStore("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemorySiteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteStore for MemorySiteStore {
    async fn create(&self, mut site: Site) -> Result<Site, CoreError> {
        self.check_online()?;
        site.id = uuid::Uuid::now_v7().to_string();
        site.version = 1;

        self.sites.write().await.push(site.clone());
        self.notify(SiteChange::Created(site.id.clone()));
        Ok(site)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Site>, CoreError> {
        self.check_online()?;
        Ok(self.sites.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self, scope: &SiteScope) -> Result<Vec<Site>, CoreError> {
        self.check_online()?;
        Ok(self
            .sites
            .read()
            .await
            .iter()
            .rev()
            .filter(|s| scope.contains(s))
            .cloned()
            .collect())
    }

    async fn replace(&self, site: &Site, expected_version: Option<i64>) -> Result<Site, CoreError> {
        self.check_online()?;
        let stored = {
            let mut sites = self.sites.write().await;
            let slot = sites
                .iter_mut()
                .find(|s| s.id == site.id)
                .ok_or_else(|| CoreError::not_found("site", site.id.as_str()))?;

            if let Some(expected) = expected_version {
                if slot.version != expected {
                    return Err(CoreError::Conflict(format!(
                        "site {} is at version {}, expected {expected}",
                        site.id, slot.version
                    )));
                }
            }

            let mut next = site.clone();
            next.version = slot.version + 1;
            *slot = next.clone();
            next
        };
        self.notify(SiteChange::Updated(stored.id.clone()));
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        self.check_online()?;
        let removed = {
            let mut sites = self.sites.write().await;
            let before = sites.len();
            sites.retain(|s| s.id != id);
            sites.len() != before
        };
        if removed {
            self.notify(SiteChange::Deleted(id.to_string()));
        }
        Ok(removed)
    }

    fn changes(&self) -> broadcast::Receiver<SiteChange> {
        self.sender.subscribe()
    }
}

// ---------------------------------------------------------------------------
// MemoryUserDirectory
// ---------------------------------------------------------------------------

/// Fixed table of user display names. Counts every lookup it serves.
#[derive(Default)]
pub struct MemoryUserDirectory {
    names: HashMap<UserId, String>,
    lookups: AtomicUsize,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: impl Into<UserId>, name: impl Into<String>) -> Self {
        self.names.insert(id.into(), name.into());
        self
    }

    /// Number of `display_name` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl UserLookup for MemoryUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.get(user_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
