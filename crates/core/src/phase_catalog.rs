//! Standard construction phases instantiated for every new site.
//!
//! The catalog is ordered: it defines both the display order and the
//! default work sequence. Templates carry no ids; each site gets fresh
//! phase ids when it is created.

use chrono::Duration;

use crate::progress::PhaseStatus;
use crate::site::Phase;
use crate::types::{new_entry_id, Timestamp};

/// Template for one standard phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTemplate {
    pub name: &'static str,
    pub description: &'static str,
    /// Estimated duration in days.
    pub estimated_duration_days: u32,
}

/// The standard phase sequence, in work order.
pub const STANDARD_PHASES: &[PhaseTemplate] = &[
    PhaseTemplate {
        name: "Fondations",
        description: "Terrassement, semelles et dalle de fondation",
        estimated_duration_days: 14,
    },
    PhaseTemplate {
        name: "Gros œuvre",
        description: "Élévation des murs, planchers et structure porteuse",
        estimated_duration_days: 45,
    },
    PhaseTemplate {
        name: "Toiture",
        description: "Charpente, couverture et étanchéité",
        estimated_duration_days: 21,
    },
    PhaseTemplate {
        name: "Électricité & Plomberie",
        description: "Réseaux électriques, alimentation en eau et évacuations",
        estimated_duration_days: 30,
    },
    PhaseTemplate {
        name: "Finitions",
        description: "Revêtements, peintures, menuiseries intérieures",
        estimated_duration_days: 28,
    },
];

impl PhaseTemplate {
    /// Build a fresh phase from this template, stamped with `actor` at `now`.
    pub fn instantiate(&self, actor: &str, now: Timestamp) -> Phase {
        Phase {
            id: new_entry_id(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            status: PhaseStatus::Pending,
            progress: 0,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            assigned_team: Vec::new(),
            materials: Vec::new(),
            estimated_duration_days: self.estimated_duration_days,
            notes: String::new(),
            photos: Vec::new(),
            last_updated: now,
            updated_by: actor.to_string(),
        }
    }
}

/// Instantiate the whole standard catalog, in order.
pub fn instantiate_phases(actor: &str, now: Timestamp) -> Vec<Phase> {
    STANDARD_PHASES
        .iter()
        .map(|template| template.instantiate(actor, now))
        .collect()
}

/// Lay phases out back to back from `start`, each lasting its estimated
/// duration. Existing planned dates are overwritten.
pub fn plan_schedule(phases: &mut [Phase], start: Timestamp) {
    let mut cursor = start;
    for phase in phases.iter_mut() {
        let end = cursor + Duration::days(i64::from(phase.estimated_duration_days));
        phase.planned_start = Some(cursor);
        phase.planned_end = Some(end);
        cursor = end;
    }
}

/// Sum of the estimated durations of the standard catalog, in days.
pub fn total_estimated_days() -> u32 {
    STANDARD_PHASES
        .iter()
        .map(|t| t.estimated_duration_days)
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use super::*;

    #[test]
    fn catalog_order_is_fixed() {
        let names: Vec<&str> = STANDARD_PHASES.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "Fondations",
                "Gros œuvre",
                "Toiture",
                "Électricité & Plomberie",
                "Finitions"
            ]
        );
    }

    #[test]
    fn instantiated_phases_start_blank() {
        let now = Utc::now();
        let phases = instantiate_phases("admin-1", now);
        assert_eq!(phases.len(), STANDARD_PHASES.len());
        for phase in &phases {
            assert_eq!(phase.progress, 0);
            assert_eq!(phase.status, PhaseStatus::Pending);
            assert!(phase.assigned_team.is_empty());
            assert!(phase.materials.is_empty());
            assert!(phase.photos.is_empty());
            assert!(phase.notes.is_empty());
            assert_eq!(phase.last_updated, now);
            assert_eq!(phase.updated_by, "admin-1");
        }
    }

    #[test]
    fn instantiated_phase_ids_are_unique_across_sites() {
        let now = Utc::now();
        let mut ids = HashSet::new();
        for _ in 0..3 {
            for phase in instantiate_phases("a", now) {
                assert!(ids.insert(phase.id));
            }
        }
        assert_eq!(ids.len(), 3 * STANDARD_PHASES.len());
    }

    #[test]
    fn schedule_is_contiguous() {
        let start = Utc::now();
        let mut phases = instantiate_phases("a", start);
        plan_schedule(&mut phases, start);

        assert_eq!(phases[0].planned_start, Some(start));
        for pair in phases.windows(2) {
            assert_eq!(pair[0].planned_end, pair[1].planned_start);
        }
        let last_end = phases.last().and_then(|p| p.planned_end).unwrap();
        assert_eq!(
            last_end,
            start + Duration::days(i64::from(total_estimated_days()))
        );
    }
}
