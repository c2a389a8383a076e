//! End-to-end site lifecycle scenarios on the in-memory store.
//!
//! - Create from the standard catalog, complete phases one by one
//! - Late site with partially completed phases
//! - Newest-first update feed over many appends
//! - Name resolution for a fully populated site

use std::sync::Arc;

use chantier_core::config::{LifecycleConfig, ResolverConfig};
use chantier_core::memory::{MemorySiteStore, MemoryUserDirectory};
use chantier_core::phase_catalog::STANDARD_PHASES;
use chantier_core::site::{NewProgressUpdate, NewSite, NewTeamMember, UpdateType};
use chantier_core::{
    NameResolver, PhaseStatus, SiteLifecycle, SiteScope, SiteStats, SiteStatus, SiteStore,
};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lifecycle() -> SiteLifecycle<MemorySiteStore> {
    SiteLifecycle::new(Arc::new(MemorySiteStore::new()), LifecycleConfig::default())
}

fn new_site(planned_end_offset_days: i64) -> NewSite {
    let now = Utc::now();
    NewSite {
        name: "Maison Bernard".into(),
        address: "25 avenue de la République, Bordeaux".into(),
        chef_id: Some("chef-42".into()),
        start_date: now - Duration::days(200),
        planned_end_date: now + Duration::days(planned_end_offset_days),
    }
}

fn update(title: &str) -> NewProgressUpdate {
    NewProgressUpdate {
        title: title.into(),
        description: format!("{title}: détails"),
        kind: UpdateType::Milestone,
        phase_id: None,
        photos: Vec::new(),
        visible_to_client: true,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn standard_catalog_site_from_start_to_finish() {
    let lc = lifecycle();
    let site_id = lc
        .create_site_from_template("client-7", "tpl-villa", new_site(90), "admin")
        .await
        .unwrap();

    let site = lc.get_site(&site_id).await.unwrap();
    assert_eq!(site.phases.len(), STANDARD_PHASES.len());
    assert_eq!(site.global_progress, 0);
    assert_eq!(site.status, SiteStatus::Pending);

    let phase_ids: Vec<String> = site.phases.iter().map(|p| p.id.clone()).collect();

    lc.update_phase_progress(&site_id, &phase_ids[0], 100, None, "chef-42")
        .await
        .unwrap();
    let site = lc.get_site(&site_id).await.unwrap();
    assert_eq!(site.global_progress, 20);
    assert_eq!(site.status, SiteStatus::InProgress);

    for phase_id in &phase_ids {
        lc.update_phase_progress(&site_id, phase_id, 100, None, "chef-42")
            .await
            .unwrap();
    }
    let site = lc.get_site(&site_id).await.unwrap();
    assert_eq!(site.global_progress, 100);
    assert_eq!(site.status, SiteStatus::Completed);
    assert!(site.actual_end_date.is_some());
    assert!(site
        .phases
        .iter()
        .all(|p| p.status == PhaseStatus::Completed));
}

#[tokio::test]
async fn late_site_with_three_of_five_phases_done() {
    let lc = lifecycle();
    let site_id = lc
        .create_site_from_template("client-8", "tpl-villa", new_site(-1), "admin")
        .await
        .unwrap();
    let site = lc.get_site(&site_id).await.unwrap();

    for phase in site.phases.iter().take(3) {
        lc.update_phase_progress(&site_id, &phase.id, 100, None, "chef-42")
            .await
            .unwrap();
    }

    let site = lc.get_site(&site_id).await.unwrap();
    assert_eq!(site.global_progress, 60);
    assert_eq!(site.status, SiteStatus::Late);

    let stats = SiteStats::from_sites(&[site], Utc::now());
    assert_eq!(stats.late, 1);
    assert_eq!(stats.overdue, 1);
}

#[tokio::test]
async fn completed_site_past_deadline_is_not_late() {
    let lc = lifecycle();
    let site_id = lc
        .create_site_from_template("client-9", "tpl", new_site(-30), "admin")
        .await
        .unwrap();
    let site = lc.get_site(&site_id).await.unwrap();
    for phase in &site.phases {
        lc.update_phase_progress(&site_id, &phase.id, 120, None, "chef")
            .await
            .unwrap();
    }
    assert_eq!(
        lc.get_site(&site_id).await.unwrap().status,
        SiteStatus::Completed
    );
}

#[tokio::test]
async fn update_feed_stays_newest_first() {
    let lc = lifecycle();
    let site_id = lc
        .create_site_from_template("client-1", "tpl", new_site(60), "admin")
        .await
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..10 {
        let id = lc
            .add_progress_update(&site_id, update(&format!("Semaine {i}")), "chef-42")
            .await
            .unwrap();
        ids.push(id);
        let site = lc.get_site(&site_id).await.unwrap();
        assert_eq!(site.updates[0].id, *ids.last().unwrap());
    }

    let site = lc.get_site(&site_id).await.unwrap();
    let stored: Vec<&str> = site.updates.iter().map(|u| u.id.as_str()).collect();
    let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn resolve_names_for_a_populated_site() {
    let lc = lifecycle();
    let site_id = lc
        .create_site_from_template("client-3", "tpl", new_site(60), "admin")
        .await
        .unwrap();
    lc.add_team_member(
        &site_id,
        NewTeamMember {
            name: "Lucas".into(),
            role: "Couvreur".into(),
            phone: Some("06 00 00 00 00".into()),
            experience: Some("10 ans".into()),
            user_id: Some("lucas-account".into()),
        },
        "chef-42",
    )
    .await
    .unwrap();
    lc.add_progress_update(&site_id, update("Toiture posée"), "chef-42")
        .await
        .unwrap();

    let resolver = NameResolver::new(
        MemoryUserDirectory::new()
            .with_user("admin", "Administrateur")
            .with_user("chef-42", "Jeanne Roux"),
        ResolverConfig::default(),
    );
    let site = lc.get_site(&site_id).await.unwrap();

    let names = resolver.resolve_site(&site).await;
    assert_eq!(names["admin"], "Administrateur");
    assert_eq!(names["chef-42"], "Jeanne Roux");
    assert_eq!(names["lucas-account"], "Utilisateur lucas-ac");

    // A second activation of the same view hits the cache only.
    let cached = resolver.cached_len().await;
    resolver.resolve_site(&site).await;
    assert_eq!(resolver.cached_len().await, cached);
}

#[tokio::test]
async fn client_scope_sees_only_its_site() {
    let lc = lifecycle();
    let mine = lc
        .create_site_from_template("client-a", "tpl", new_site(60), "admin")
        .await
        .unwrap();
    lc.create_site_from_template("client-b", "tpl", new_site(60), "admin")
        .await
        .unwrap();

    let sites = lc
        .store()
        .as_ref()
        .list(&SiteScope::Client("client-a".into()))
        .await
        .unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].id, mine);
}
