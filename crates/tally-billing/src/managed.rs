use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping columns maintained by storage.
///
/// Never part of content equality: re-observing an entity must not count as
/// a change just because its timestamps differ.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedFields {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ManagedFields {
    /// Fields of a row created at `now`.
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Access to the bookkeeping columns of an entity.
pub trait Managed {
    fn managed(&self) -> &ManagedFields;

    fn managed_mut(&mut self) -> &mut ManagedFields;

    /// Mark the entity soft-deleted at `at`, keeping an earlier deletion time.
    fn soft_delete(&mut self, at: DateTime<Utc>) {
        let managed = self.managed_mut();
        if managed.deleted_at.is_none() {
            managed.deleted_at = Some(at);
        }
    }
}
