/// Generate a new time-ordered entity identifier (UUID v7).
///
/// Rows created in the same reconciliation pass sort by creation order.
pub fn new_entity_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Returns `true` if `id` denotes an entity that has never been persisted.
pub fn is_unsaved(id: &str) -> bool {
    id.is_empty()
}
