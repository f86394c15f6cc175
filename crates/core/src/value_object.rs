//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**. They are immutable and compared by
/// their attribute values.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: `Destination { hostel: "Block A", room: "101" }`, an
///   order line snapshot, a category name
/// - **Entity**: `Product { id: ProductId(..), .. }`, `Order { id: OrderId(..), .. }`
///
/// Order lines are value objects on purpose: once an order commits, its lines
/// are frozen copies and never follow later changes to the product they came from.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Destination {
///     hostel: String,
///     room: String,
/// }
///
/// impl ValueObject for Destination {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
