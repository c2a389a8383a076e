//! Cross-reference resolver: user ids to display names.
//!
//! A site references users in many places (chef, creator, phase updaters,
//! team accounts, photo uploaders, update authors). [`NameResolver`]
//! resolves a batch of such ids once per view activation and caches every
//! answer, including fallbacks, for the life of the process. Display names
//! are treated as immutable within a session, so the cache is never
//! invalidated.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use crate::config::ResolverConfig;
use crate::site::Site;
use crate::store::UserLookup;
use crate::types::UserId;

/// Prefix of the synthesized label for users that cannot be resolved.
pub const FALLBACK_LABEL_PREFIX: &str = "Utilisateur";

pub struct NameResolver<L> {
    lookup: L,
    config: ResolverConfig,
    cache: RwLock<HashMap<UserId, String>>,
}

impl<L: UserLookup> NameResolver<L> {
    pub fn new(lookup: L, config: ResolverConfig) -> Self {
        Self {
            lookup,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve every id in `ids` to a display name.
    ///
    /// Ids are deduplicated and only uncached ids are looked up. A failed or
    /// empty lookup yields a fallback label built from the id, so the result
    /// has an entry for every requested id.
    pub async fn resolve_names<'a, I>(&self, ids: I) -> HashMap<UserId, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: BTreeSet<&str> = ids.into_iter().filter(|id| !id.is_empty()).collect();

        // Held for the whole batch so concurrent batches never look up the
        // same id twice.
        let mut cache = self.cache.write().await;
        for id in &wanted {
            if cache.contains_key(*id) {
                continue;
            }
            let name = match self.lookup.display_name(id).await {
                Ok(Some(name)) if !name.trim().is_empty() => name,
                Ok(_) => {
                    tracing::debug!(user_id = *id, "User not found, using fallback label");
                    self.fallback_label(id)
                }
                Err(e) => {
                    tracing::warn!(user_id = *id, error = %e, "User lookup failed, using fallback label");
                    self.fallback_label(id)
                }
            };
            cache.insert(id.to_string(), name);
        }

        wanted
            .into_iter()
            .filter_map(|id| cache.get(id).map(|name| (id.to_string(), name.clone())))
            .collect()
    }

    /// Resolve every user referenced by `site`.
    pub async fn resolve_site(&self, site: &Site) -> HashMap<UserId, String> {
        let refs = collect_site_references(site);
        self.resolve_names(refs.iter().map(String::as_str)).await
    }

    /// Cached display name, without triggering a lookup.
    pub async fn cached(&self, user_id: &str) -> Option<String> {
        self.cache.read().await.get(user_id).cloned()
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Deterministic label for an unresolvable id.
    pub fn fallback_label(&self, user_id: &str) -> String {
        let short: String = user_id.chars().take(self.config.fallback_id_len).collect();
        format!("{FALLBACK_LABEL_PREFIX} {short}")
    }
}

/// Every user id referenced anywhere in a site, deduplicated and sorted.
pub fn collect_site_references(site: &Site) -> BTreeSet<UserId> {
    let mut refs = BTreeSet::new();
    refs.insert(site.created_by.clone());
    refs.extend(site.chef_id.iter().cloned());
    refs.extend(site.phases.iter().map(|p| p.updated_by.clone()));
    for member in &site.team {
        refs.extend(member.user_id.iter().cloned());
        refs.insert(member.added_by.clone());
    }
    refs.extend(site.gallery.iter().map(|p| p.uploaded_by.clone()));
    refs.extend(site.updates.iter().map(|u| u.created_by.clone()));
    refs.retain(|id| !id.is_empty());
    refs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
