//! Integration tests for the PostgreSQL site store.
//!
//! Exercises the store against a real database:
//! - Document round-trip through JSONB
//! - Scoped listing order
//! - Version-checked replace and delete
//! - Display name lookup with email fallback
//! - LISTEN/NOTIFY change forwarding

use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chantier_core::config::LifecycleConfig;
use chantier_core::site::NewSite;
use chantier_core::{CoreError, Site, SiteChange, SiteLifecycle, SiteScope, SiteStatus, SiteStore, UserLookup};
use chantier_db::models::user::CreateUser;
use chantier_db::{PgSiteStore, PgUserDirectory, UserRepo};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn draft(client_id: &str, chef_id: Option<&str>) -> Site {
    let now = Utc::now();
    let input = NewSite {
        name: format!("Chantier {client_id}"),
        address: "12 quai des Chartrons, Bordeaux".into(),
        chef_id: chef_id.map(str::to_string),
        start_date: now,
        planned_end_date: now + Duration::days(120),
    };
    Site::from_template(client_id, "tpl-maison", &input, "admin", now).unwrap()
}

async fn next_change(rx: &mut broadcast::Receiver<SiteChange>) -> SiteChange {
    tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
        .await
        .expect("no change within 5s")
        .expect("change channel closed")
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_and_reload_site(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let created = store.create(draft("client-1", Some("chef-1"))).await.unwrap();

    assert!(!created.id.is_empty());
    assert_eq!(created.version, 1);

    let loaded = store.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.phases.len(), 5);
    assert_eq!(loaded.status, SiteStatus::Pending);
    assert_eq!(loaded.chef_id.as_deref(), Some("chef-1"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_site_is_none(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    assert!(store.find_by_id("nope").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_respects_scope(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let a = store.create(draft("client-a", Some("chef-1"))).await.unwrap();
    let b = store.create(draft("client-b", Some("chef-1"))).await.unwrap();
    store.create(draft("client-c", Some("chef-2"))).await.unwrap();

    assert_eq!(store.list(&SiteScope::All).await.unwrap().len(), 3);

    let chef = store.list(&SiteScope::Chef("chef-1".into())).await.unwrap();
    let ids: Vec<&str> = chef.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a.id.as_str()));
    assert!(ids.contains(&b.id.as_str()));

    let client = store.list(&SiteScope::Client("client-b".into())).await.unwrap();
    assert_eq!(client.len(), 1);
    assert_eq!(client[0].id, b.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn replace_checks_version(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let site = store.create(draft("client-1", None)).await.unwrap();

    let mut edited = site.clone();
    edited.name = "Maison rénovée".into();
    edited.chef_id = Some("chef-9".into());
    let stored = store.replace(&edited, Some(1)).await.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.name, "Maison rénovée");

    // The chef column follows the document.
    let chef = store.list(&SiteScope::Chef("chef-9".into())).await.unwrap();
    assert_eq!(chef.len(), 1);

    assert_matches!(store.replace(&edited, Some(1)).await, Err(CoreError::Conflict(_)));

    let stored = store.replace(&edited, None).await.unwrap();
    assert_eq!(stored.version, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn replace_missing_site_is_not_found(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let mut ghost = draft("client-1", None);
    ghost.id = "ghost".into();
    assert_matches!(
        store.replace(&ghost, None).await,
        Err(CoreError::NotFound { entity: "site", .. })
    );
    assert_matches!(
        store.replace(&ghost, Some(1)).await,
        Err(CoreError::NotFound { entity: "site", .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_reports_whether_a_row_went_away(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let site = store.create(draft("client-1", None)).await.unwrap();

    assert!(store.delete(&site.id).await.unwrap());
    assert!(!store.delete(&site.id).await.unwrap());
    assert!(store.find_by_id(&site.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lifecycle_runs_on_postgres(pool: PgPool) {
    let lifecycle = SiteLifecycle::new(
        Arc::new(PgSiteStore::new(pool)),
        LifecycleConfig {
            optimistic_concurrency: true,
        },
    );
    let now = Utc::now();
    let site_id = lifecycle
        .create_site_from_template(
            "client-1",
            "tpl",
            NewSite {
                name: "Villa".into(),
                address: "1 chemin du Lac".into(),
                chef_id: Some("chef-1".into()),
                start_date: now,
                planned_end_date: now + Duration::days(60),
            },
            "admin",
        )
        .await
        .unwrap();

    let site = lifecycle.get_site(&site_id).await.unwrap();
    lifecycle
        .update_phase_progress(&site_id, &site.phases[0].id, 50, None, "chef-1")
        .await
        .unwrap();

    let site = lifecycle.get_site(&site_id).await.unwrap();
    assert_eq!(site.global_progress, 10);
    assert_eq!(site.status, SiteStatus::InProgress);
    assert_eq!(site.version, 2);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn display_name_falls_back_to_email(pool: PgPool) {
    let named = UserRepo::create(
        &pool,
        &CreateUser {
            email: "jeanne@example.fr".into(),
            display_name: Some("Jeanne Roux".into()),
        },
    )
    .await
    .unwrap();
    let anonymous = UserRepo::create(
        &pool,
        &CreateUser {
            email: "ouvrier@example.fr".into(),
            display_name: Some("   ".into()),
        },
    )
    .await
    .unwrap();

    let directory = PgUserDirectory::new(pool);
    assert_eq!(
        directory.display_name(&named.id).await.unwrap().as_deref(),
        Some("Jeanne Roux")
    );
    assert_eq!(
        directory.display_name(&anonymous.id).await.unwrap().as_deref(),
        Some("ouvrier@example.fr")
    );
    assert_eq!(directory.display_name("unknown").await.unwrap(), None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_email_is_rejected(pool: PgPool) {
    let input = CreateUser {
        email: "dup@example.fr".into(),
        display_name: None,
    };
    UserRepo::create(&pool, &input).await.unwrap();
    let err = UserRepo::create(&pool, &input).await.unwrap_err();
    assert!(err.to_string().contains("uq_users_email"));
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn listener_forwards_trigger_notifications(pool: PgPool) {
    let store = PgSiteStore::new(pool);
    let mut rx = store.changes();
    let cancel = CancellationToken::new();
    let handle = store.spawn_listener(cancel.clone());

    // Every connect announces a resync before any row change.
    assert_eq!(next_change(&mut rx).await, SiteChange::Resync);

    let site = store.create(draft("client-1", None)).await.unwrap();
    assert_eq!(next_change(&mut rx).await, SiteChange::Created(site.id.clone()));

    store.replace(&site, None).await.unwrap();
    assert_eq!(next_change(&mut rx).await, SiteChange::Updated(site.id.clone()));

    store.delete(&site.id).await.unwrap();
    assert_eq!(next_change(&mut rx).await, SiteChange::Deleted(site.id.clone()));

    cancel.cancel();
    handle.await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listener_resyncs_only_after_listen_is_rearmed(pool: PgPool) {
    let store = PgSiteStore::new(pool.clone());
    let mut rx = store.changes();
    let cancel = CancellationToken::new();
    let handle = store.spawn_listener(cancel.clone());
    assert_eq!(next_change(&mut rx).await, SiteChange::Resync);

    // Kill the listening connection from the server side.
    let killed: Vec<bool> = sqlx::query_scalar(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity
         WHERE datname = current_database()
           AND pid <> pg_backend_pid()
           AND query ILIKE 'LISTEN%'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert!(!killed.is_empty());

    assert_eq!(next_change(&mut rx).await, SiteChange::Resync);

    // A write right after the Resync must still be delivered.
    let site = store.create(draft("client-1", None)).await.unwrap();
    assert_eq!(next_change(&mut rx).await, SiteChange::Created(site.id.clone()));

    cancel.cancel();
    handle.await.unwrap();
}
