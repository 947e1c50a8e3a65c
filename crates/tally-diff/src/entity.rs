//! Capabilities every diffable value exposes.

/// A value that can be correlated by identity.
pub trait Entity {
    /// Persistent identifier. Empty means "not yet persisted".
    fn id(&self) -> &str;

    /// Soft-delete flag. A non-empty ID combined with `true` is a request to
    /// tombstone the stored row.
    fn is_deleted(&self) -> bool;
}

/// Deep value equality over persisted fields.
///
/// Implementations must ignore bookkeeping (timestamps, the soft-delete
/// marker) and any parent reference, and must be reflexive.
pub trait Equaler {
    fn equal(&self, other: &Self) -> bool;
}

impl<T: Entity + ?Sized> Entity for &T {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn is_deleted(&self) -> bool {
        (**self).is_deleted()
    }
}

impl<T: Equaler + ?Sized> Equaler for &T {
    fn equal(&self, other: &Self) -> bool {
        (**self).equal(*other)
    }
}

/// A child entity tagged with its structural parent.
///
/// The child does not own a back-reference; consumers resolve the foreign
/// key through `parent`. Identity and equality delegate to `entity` only.
#[derive(Clone, Copy, Debug)]
pub struct WithParent<T, P> {
    pub entity: T,
    pub parent: P,
}

impl<T, P> WithParent<T, P> {
    pub fn new(entity: T, parent: P) -> Self {
        Self { entity, parent }
    }
}

impl<T: Entity, P> Entity for WithParent<T, P> {
    fn id(&self) -> &str {
        self.entity.id()
    }

    fn is_deleted(&self) -> bool {
        self.entity.is_deleted()
    }
}

impl<T: Equaler, P> Equaler for WithParent<T, P> {
    fn equal(&self, other: &Self) -> bool {
        self.entity.equal(&other.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        id: &'static str,
        value: u32,
        deleted: bool,
    }

    impl Entity for Row {
        fn id(&self) -> &str {
            self.id
        }

        fn is_deleted(&self) -> bool {
            self.deleted
        }
    }

    impl Equaler for Row {
        fn equal(&self, other: &Self) -> bool {
            self.id == other.id && self.value == other.value
        }
    }

    #[test]
    fn references_delegate() {
        let row = Row { id: "a", value: 1, deleted: true };
        let by_ref = &row;
        assert_eq!(by_ref.id(), "a");
        assert!(by_ref.is_deleted());
        assert!(<&Row as Equaler>::equal(&by_ref, &&row));
    }

    #[test]
    fn with_parent_ignores_parent_for_equality() {
        let a = Row { id: "a", value: 1, deleted: false };
        let b = Row { id: "a", value: 1, deleted: true };
        let left = WithParent::new(&a, "parent-1");
        let right = WithParent::new(&b, "parent-2");
        assert!(left.equal(&right));
        assert_eq!(right.id(), "a");
        assert!(right.is_deleted());
    }

    #[test]
    fn with_parent_detects_child_changes() {
        let a = Row { id: "a", value: 1, deleted: false };
        let b = Row { id: "a", value: 2, deleted: false };
        assert!(!WithParent::new(&a, ()).equal(&WithParent::new(&b, ())));
    }
}
