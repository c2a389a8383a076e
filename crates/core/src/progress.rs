//! Phase and site progress aggregation.
//!
//! Pure functions deriving a phase's status from its progress percentage and
//! a site's global progress and status from its phases and planned end
//! date. Nothing here performs I/O; the lifecycle manager calls these after
//! every mutation so the stored aggregates never go stale relative to the
//! phase data.

use serde::{Deserialize, Serialize};

use crate::site::Phase;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Progress value of a finished phase or site.
pub const MAX_PROGRESS: u8 = 100;

pub const PHASE_PENDING: &str = "pending";
pub const PHASE_IN_PROGRESS: &str = "in-progress";
pub const PHASE_COMPLETED: &str = "completed";
pub const PHASE_BLOCKED: &str = "blocked";

/// All valid phase status strings.
pub const VALID_PHASE_STATUSES: &[&str] =
    &[PHASE_PENDING, PHASE_IN_PROGRESS, PHASE_COMPLETED, PHASE_BLOCKED];

pub const SITE_PENDING: &str = "En attente";
pub const SITE_IN_PROGRESS: &str = "En cours";
pub const SITE_COMPLETED: &str = "Terminé";
pub const SITE_LATE: &str = "En retard";

/// All valid site status strings.
pub const VALID_SITE_STATUSES: &[&str] =
    &[SITE_PENDING, SITE_IN_PROGRESS, SITE_COMPLETED, SITE_LATE];

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a single construction phase.
///
/// `Blocked` is never derived from progress; it is only set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl PhaseStatus {
    /// Convert from a stored string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            PHASE_PENDING => Ok(Self::Pending),
            PHASE_IN_PROGRESS => Ok(Self::InProgress),
            PHASE_COMPLETED => Ok(Self::Completed),
            PHASE_BLOCKED => Ok(Self::Blocked),
            _ => Err(format!(
                "Invalid phase status '{s}'. Must be one of: {}",
                VALID_PHASE_STATUSES.join(", ")
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => PHASE_PENDING,
            Self::InProgress => PHASE_IN_PROGRESS,
            Self::Completed => PHASE_COMPLETED,
            Self::Blocked => PHASE_BLOCKED,
        }
    }
}

/// Status of a whole site, as displayed in the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteStatus {
    #[serde(rename = "En attente")]
    Pending,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Terminé")]
    Completed,
    #[serde(rename = "En retard")]
    Late,
}

impl SiteStatus {
    /// Convert from a stored string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            SITE_PENDING => Ok(Self::Pending),
            SITE_IN_PROGRESS => Ok(Self::InProgress),
            SITE_COMPLETED => Ok(Self::Completed),
            SITE_LATE => Ok(Self::Late),
            _ => Err(format!(
                "Invalid site status '{s}'. Must be one of: {}",
                VALID_SITE_STATUSES.join(", ")
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => SITE_PENDING,
            Self::InProgress => SITE_IN_PROGRESS,
            Self::Completed => SITE_COMPLETED,
            Self::Late => SITE_LATE,
        }
    }

    /// Work has started and is not finished (on time or late).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Late)
    }
}

// ---------------------------------------------------------------------------
// Aggregation functions
// ---------------------------------------------------------------------------

/// Clamp an arbitrary integer into the `[0, 100]` progress range.
pub fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, MAX_PROGRESS as i64) as u8
}

/// Derive a phase status from an already-clamped progress value.
///
/// Never returns [`PhaseStatus::Blocked`].
pub fn derive_phase_status(progress: u8) -> PhaseStatus {
    match progress {
        0 => PhaseStatus::Pending,
        MAX_PROGRESS => PhaseStatus::Completed,
        _ => PhaseStatus::InProgress,
    }
}

/// Mean progress of all phases, rounded half-up. Returns 0 for no phases.
pub fn compute_global_progress(phases: &[Phase]) -> u8 {
    if phases.is_empty() {
        return 0;
    }
    let n = phases.len() as u64;
    let sum: u64 = phases.iter().map(|p| u64::from(p.progress)).sum();
    // round(sum / n) with halves going up, without floating point.
    let mean = (2 * sum + n) / (2 * n);
    mean.min(u64::from(MAX_PROGRESS)) as u8
}

/// Derive the site status against the current wall-clock time.
pub fn derive_site_status(phases: &[Phase], planned_end: Timestamp) -> SiteStatus {
    derive_site_status_at(phases, planned_end, chrono::Utc::now())
}

/// Derive the site status as of `now`.
///
/// Completion takes priority over lateness, and a site that has not started
/// is pending even past its planned end date.
pub fn derive_site_status_at(
    phases: &[Phase],
    planned_end: Timestamp,
    now: Timestamp,
) -> SiteStatus {
    status_for_progress(compute_global_progress(phases), planned_end, now)
}

/// Site status for a known global progress value.
pub fn status_for_progress(global: u8, planned_end: Timestamp, now: Timestamp) -> SiteStatus {
    if global >= MAX_PROGRESS {
        SiteStatus::Completed
    } else if global == 0 {
        SiteStatus::Pending
    } else if now > planned_end {
        SiteStatus::Late
    } else {
        SiteStatus::InProgress
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
