//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products, orders and user accounts are entities: two records with the same
/// id describe the same thing even when their other fields differ (a product
/// whose stock dropped is still the same product).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
