//! Repository layer: one unit struct per table, taking the pool per call.

pub mod site_repo;
pub mod user_repo;

pub use site_repo::SiteRepo;
pub use user_repo::{PgUserDirectory, UserRepo};
