//! Chantier (construction site) lifecycle core.
//!
//! - [`progress`]: pure phase/site status and progress aggregation.
//! - [`phase_catalog`]: the ordered standard phases every site starts with.
//! - [`site`]: the site document model and its in-memory mutations.
//! - [`lifecycle`]: [`SiteLifecycle`], read-modify-write operations against
//!   an injected [`SiteStore`].
//! - [`stats`]: directory scopes and dashboard counts.
//! - [`resolver`]: [`NameResolver`], cached user-id to display-name lookup.
//! - [`store`] / [`memory`]: backing-store traits and in-process
//!   implementations.
//!
//! This crate has no database dependency; `chantier-db` implements the
//! store traits on PostgreSQL.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod phase_catalog;
pub mod progress;
pub mod resolver;
pub mod site;
pub mod stats;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use lifecycle::SiteLifecycle;
pub use progress::{PhaseStatus, SiteStatus};
pub use resolver::NameResolver;
pub use site::Site;
pub use stats::{SiteScope, SiteStats};
pub use store::{SiteChange, SiteStore, UserLookup};
