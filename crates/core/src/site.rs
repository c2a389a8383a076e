//! Site ("chantier") document model and in-memory mutations.
//!
//! A [`Site`] embeds its phases, team, photo gallery and update feed; none
//! of those children are addressable outside their site. The mutation
//! methods here are pure transformations of a loaded document: they
//! validate, apply the change, stamp the actor and recompute the derived
//! aggregates via [`crate::progress`]. Persistence is the caller's job
//! (see [`crate::lifecycle`]).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::phase_catalog;
use crate::progress::{self, PhaseStatus, SiteStatus, MAX_PROGRESS};
use crate::types::{
    new_entry_id, ClientId, EntryId, PhaseId, SiteId, TemplateId, Timestamp, UserId,
};

/// Maximum length of short free-text labels (names, titles, roles).
pub const MAX_LABEL_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Embedded entities
// ---------------------------------------------------------------------------

/// One unit of construction work within a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    pub description: String,
    pub status: PhaseStatus,
    /// Always within `[0, 100]`.
    pub progress: u8,
    pub planned_start: Option<Timestamp>,
    pub planned_end: Option<Timestamp>,
    pub actual_start: Option<Timestamp>,
    pub actual_end: Option<Timestamp>,
    /// Ids of [`TeamMember`]s working on this phase.
    #[serde(default)]
    pub assigned_team: Vec<EntryId>,
    #[serde(default)]
    pub materials: Vec<String>,
    pub estimated_duration_days: u32,
    #[serde(default)]
    pub notes: String,
    /// Photo urls attached to this phase.
    #[serde(default)]
    pub photos: Vec<String>,
    pub last_updated: Timestamp,
    pub updated_by: UserId,
}

impl Phase {
    fn stamp(&mut self, actor: &str, now: Timestamp) {
        self.last_updated = now;
        self.updated_by = actor.to_string();
    }
}

/// A worker assigned to a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: EntryId,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub experience: Option<String>,
    /// Linked user account, if the worker has one.
    pub user_id: Option<UserId>,
    pub added_at: Timestamp,
    pub added_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A photo in the site gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPhoto {
    pub id: EntryId,
    pub url: String,
    pub phase_id: Option<PhaseId>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub uploaded_at: Timestamp,
    pub uploaded_by: UserId,
}

/// Kind of entry in the site update feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    PhaseCompletion,
    Issue,
    Delivery,
    Milestone,
}

/// An entry of the site update feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub id: EntryId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: UpdateType,
    pub phase_id: Option<PhaseId>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub created_at: Timestamp,
    pub created_by: UserId,
    pub visible_to_client: bool,
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// A construction site and everything embedded in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Assigned by the store on creation; empty until then.
    #[serde(default)]
    pub id: SiteId,
    /// Store-managed write counter, bumped on every write.
    #[serde(default)]
    pub version: i64,
    pub client_id: ClientId,
    /// Project template the site was created from.
    pub project_id: TemplateId,
    pub name: String,
    pub address: String,
    pub status: SiteStatus,
    pub global_progress: u8,
    pub start_date: Timestamp,
    pub planned_end_date: Timestamp,
    pub actual_end_date: Option<Timestamp>,
    pub phases: Vec<Phase>,
    pub chef_id: Option<UserId>,
    #[serde(default)]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub gallery: Vec<ProgressPhoto>,
    /// Newest first.
    #[serde(default)]
    pub updates: Vec<ProgressUpdate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: UserId,
}

// ---------------------------------------------------------------------------
// Input DTOs
// ---------------------------------------------------------------------------

/// Caller-supplied fields for a new site.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub name: String,
    pub address: String,
    pub chef_id: Option<UserId>,
    pub start_date: Timestamp,
    pub planned_end_date: Timestamp,
}

/// Caller-supplied fields for a new team member.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeamMember {
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub experience: Option<String>,
    pub user_id: Option<UserId>,
}

/// Caller-supplied fields for a new update feed entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgressUpdate {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: UpdateType,
    pub phase_id: Option<PhaseId>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub visible_to_client: bool,
}

/// Partial update of a site's descriptive fields. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDetailsPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub chef_id: Option<UserId>,
    pub start_date: Option<Timestamp>,
    pub planned_end_date: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a required label is non-blank and not too long.
pub fn validate_label(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_LABEL_LENGTH {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_LABEL_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_dates(start: Timestamp, planned_end: Timestamp) -> Result<(), CoreError> {
    if planned_end < start {
        return Err(CoreError::Validation(
            "Planned end date must not precede the start date".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Construction and mutations
// ---------------------------------------------------------------------------

impl Site {
    /// Build a new, unsaved site from the standard phase catalog.
    ///
    /// The returned site has an empty id; the store assigns one on create.
    pub fn from_template(
        client_id: &str,
        project_id: &str,
        input: &NewSite,
        actor: &str,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        validate_label("Site name", &input.name)?;
        validate_label("Site address", &input.address)?;
        validate_dates(input.start_date, input.planned_end_date)?;

        let mut phases = phase_catalog::instantiate_phases(actor, now);
        phase_catalog::plan_schedule(&mut phases, input.start_date);

        Ok(Self {
            id: SiteId::new(),
            version: 0,
            client_id: client_id.to_string(),
            project_id: project_id.to_string(),
            name: input.name.trim().to_string(),
            address: input.address.trim().to_string(),
            status: SiteStatus::Pending,
            global_progress: 0,
            start_date: input.start_date,
            planned_end_date: input.planned_end_date,
            actual_end_date: None,
            phases,
            chef_id: input.chef_id.clone(),
            team: Vec::new(),
            gallery: Vec::new(),
            updates: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
        })
    }

    pub fn phase(&self, phase_id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    fn phase_mut(&mut self, phase_id: &str) -> Result<&mut Phase, CoreError> {
        self.phases
            .iter_mut()
            .find(|p| p.id == phase_id)
            .ok_or_else(|| CoreError::not_found("phase", phase_id))
    }

    /// Recompute global progress, status and actual end date as of `now`.
    pub fn recompute(&mut self, now: Timestamp) {
        self.global_progress = progress::compute_global_progress(&self.phases);
        self.status =
            progress::status_for_progress(self.global_progress, self.planned_end_date, now);
        if self.global_progress >= MAX_PROGRESS {
            self.actual_end_date.get_or_insert(now);
        } else {
            self.actual_end_date = None;
        }
        self.updated_at = now;
    }

    /// Set a phase's progress (clamped), derive its status, and recompute the
    /// site aggregates. `notes` replaces the phase notes only when given.
    pub fn apply_phase_progress(
        &mut self,
        phase_id: &str,
        progress: i64,
        notes: Option<String>,
        actor: &str,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let progress = progress::clamp_progress(progress);
        let phase = self.phase_mut(phase_id)?;

        phase.progress = progress;
        phase.status = progress::derive_phase_status(progress);
        if let Some(notes) = notes {
            phase.notes = notes;
        }
        if progress > 0 {
            phase.actual_start.get_or_insert(now);
        }
        if progress >= MAX_PROGRESS {
            phase.actual_end.get_or_insert(now);
        } else {
            phase.actual_end = None;
        }
        phase.stamp(actor, now);

        self.recompute(now);
        Ok(())
    }

    /// Block or unblock a phase. Unblocking restores the status derived from
    /// the phase's progress.
    pub fn set_phase_blocked(
        &mut self,
        phase_id: &str,
        blocked: bool,
        actor: &str,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let phase = self.phase_mut(phase_id)?;
        phase.status = if blocked {
            PhaseStatus::Blocked
        } else {
            progress::derive_phase_status(phase.progress)
        };
        phase.stamp(actor, now);

        self.recompute(now);
        Ok(())
    }

    /// Attach a photo to a phase and record it in the gallery.
    pub fn attach_phase_photo(
        &mut self,
        phase_id: &str,
        url: &str,
        description: Option<String>,
        actor: &str,
        now: Timestamp,
    ) -> Result<EntryId, CoreError> {
        if url.trim().is_empty() {
            return Err(CoreError::Validation("Photo url must not be empty".into()));
        }
        let phase = self.phase_mut(phase_id)?;
        phase.photos.push(url.to_string());
        phase.stamp(actor, now);

        let id = new_entry_id();
        self.gallery.push(ProgressPhoto {
            id: id.clone(),
            url: url.to_string(),
            phase_id: Some(phase_id.to_string()),
            description,
            location: None,
            uploaded_at: now,
            uploaded_by: actor.to_string(),
        });
        self.updated_at = now;
        Ok(id)
    }

    pub fn add_team_member(
        &mut self,
        member: NewTeamMember,
        actor: &str,
        now: Timestamp,
    ) -> Result<EntryId, CoreError> {
        validate_label("Team member name", &member.name)?;
        validate_label("Team member role", &member.role)?;

        let id = new_entry_id();
        self.team.push(TeamMember {
            id: id.clone(),
            name: member.name.trim().to_string(),
            role: member.role.trim().to_string(),
            phone: member.phone,
            experience: member.experience,
            user_id: member.user_id,
            added_at: now,
            added_by: actor.to_string(),
        });
        self.updated_at = now;
        Ok(id)
    }

    /// Remove a team member and drop them from every phase assignment.
    pub fn remove_team_member(&mut self, member_id: &str, now: Timestamp) -> Result<(), CoreError> {
        let before = self.team.len();
        self.team.retain(|m| m.id != member_id);
        if self.team.len() == before {
            return Err(CoreError::not_found("team member", member_id));
        }
        for phase in &mut self.phases {
            phase.assigned_team.retain(|id| id != member_id);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Insert an update at the front of the feed.
    pub fn prepend_update(
        &mut self,
        update: NewProgressUpdate,
        actor: &str,
        now: Timestamp,
    ) -> Result<EntryId, CoreError> {
        validate_label("Update title", &update.title)?;
        if let Some(phase_id) = update.phase_id.as_deref() {
            if self.phase(phase_id).is_none() {
                return Err(CoreError::not_found("phase", phase_id));
            }
        }

        let id = new_entry_id();
        self.updates.insert(
            0,
            ProgressUpdate {
                id: id.clone(),
                title: update.title.trim().to_string(),
                description: update.description,
                kind: update.kind,
                phase_id: update.phase_id,
                photos: update.photos,
                created_at: now,
                created_by: actor.to_string(),
                visible_to_client: update.visible_to_client,
            },
        );
        self.updated_at = now;
        Ok(id)
    }

    /// Apply a details patch and recompute the status, which depends on the
    /// planned end date.
    pub fn apply_details(&mut self, patch: SiteDetailsPatch, now: Timestamp) -> Result<(), CoreError> {
        if let Some(name) = patch.name.as_deref() {
            validate_label("Site name", name)?;
        }
        if let Some(address) = patch.address.as_deref() {
            validate_label("Site address", address)?;
        }
        let start = patch.start_date.unwrap_or(self.start_date);
        let planned_end = patch.planned_end_date.unwrap_or(self.planned_end_date);
        validate_dates(start, planned_end)?;

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(address) = patch.address {
            self.address = address.trim().to_string();
        }
        if patch.chef_id.is_some() {
            self.chef_id = patch.chef_id;
        }
        self.start_date = start;
        self.planned_end_date = planned_end;

        self.recompute(now);
        Ok(())
    }

    /// Status this site would have if recomputed at `now`.
    pub fn current_status(&self, now: Timestamp) -> SiteStatus {
        progress::status_for_progress(self.global_progress, self.planned_end_date, now)
    }

    /// Number of phases marked completed.
    pub fn completed_phase_count(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Completed)
            .count()
    }

    /// The first phase in work order that is not completed yet.
    pub fn next_open_phase(&self) -> Option<&Phase> {
        self.phases
            .iter()
            .find(|p| p.status != PhaseStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
