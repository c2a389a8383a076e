/// Document ids are opaque strings assigned by the backing store.
pub type SiteId = String;

/// Opaque user reference supplied by the identity provider.
pub type UserId = String;

pub type ClientId = String;

/// Reference to the project template a site was created from.
pub type TemplateId = String;

pub type PhaseId = String;

/// Id of an entry embedded in a site (team member, photo, update).
pub type EntryId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh id for an embedded entity.
pub fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
