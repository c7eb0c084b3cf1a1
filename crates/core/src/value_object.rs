//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity of their own: two values with the same
/// contents are interchangeable. A display id prefix like `25INT1211` is a value
/// object; the identity record it ends up in is an entity.
///
/// Value objects are immutable. To "change" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Department(String);
///
/// impl ValueObject for Department {}
///
/// assert_eq!(Department("IT".into()), Department("IT".into()));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
