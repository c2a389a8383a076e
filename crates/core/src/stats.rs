//! Directory scopes and dashboard statistics over a list of sites.

use serde::{Deserialize, Serialize};

use crate::progress::SiteStatus;
use crate::site::Site;
use crate::types::{ClientId, Timestamp, UserId};

/// Which sites a directory view sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "id")]
pub enum SiteScope {
    /// Every site (administrator view).
    All,
    /// Sites managed by one chef.
    Chef(UserId),
    /// Sites of one client.
    Client(ClientId),
}

impl SiteScope {
    pub fn contains(&self, site: &Site) -> bool {
        match self {
            Self::All => true,
            Self::Chef(chef_id) => site.chef_id.as_deref() == Some(chef_id.as_str()),
            Self::Client(client_id) => site.client_id == *client_id,
        }
    }
}

/// Counts derived from a full site list.
///
/// Always rebuilt from the list via [`SiteStats::from_sites`]; never updated
/// incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub late: usize,
    /// Sites whose stored status is `En cours` or `En retard`.
    pub active: usize,
    /// Sites that are late as of `now`, even if their stored status has not
    /// been refreshed since the planned end date passed.
    pub overdue: usize,
    /// Mean global progress over all sites, rounded half-up.
    pub average_progress: u8,
}

impl SiteStats {
    pub fn from_sites(sites: &[Site], now: Timestamp) -> Self {
        let mut stats = Self {
            total: sites.len(),
            ..Self::default()
        };
        let mut progress_sum: u64 = 0;

        for site in sites {
            match site.status {
                SiteStatus::Pending => stats.pending += 1,
                SiteStatus::InProgress => stats.in_progress += 1,
                SiteStatus::Completed => stats.completed += 1,
                SiteStatus::Late => stats.late += 1,
            }
            if site.status.is_active() {
                stats.active += 1;
            }
            if site.current_status(now) == SiteStatus::Late {
                stats.overdue += 1;
            }
            progress_sum += u64::from(site.global_progress);
        }

        if !sites.is_empty() {
            let n = sites.len() as u64;
            stats.average_progress = ((2 * progress_sum + n) / (2 * n)) as u8;
        }
        stats
    }

    pub fn count(&self, status: SiteStatus) -> usize {
        match status {
            SiteStatus::Pending => self.pending,
            SiteStatus::InProgress => self.in_progress,
            SiteStatus::Completed => self.completed,
            SiteStatus::Late => self.late,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
