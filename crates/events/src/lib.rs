//! Realtime site directory for chantier views.
//!
//! - [`SiteDirectory`] turns a [`SiteStore`](chantier_core::SiteStore)
//!   change feed into full-snapshot callbacks, either for a scoped list of
//!   sites or for a single site.
//! - [`Subscription`] is the disposable handle returned by every subscribe
//!   call; dropping it stops delivery.

pub mod directory;
pub mod subscription;

pub use directory::{DirectorySnapshot, SiteDirectory, SiteSnapshot};
pub use subscription::Subscription;
