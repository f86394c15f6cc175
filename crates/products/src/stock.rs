//! Stock and quantity arithmetic.
//!
//! The cart applies these rules advisorily against its last known snapshot and
//! the order engine applies them authoritatively against the store. Both must
//! call the same functions, otherwise the two checks drift apart.

/// Whether `requested` units can be taken from `stock`.
pub fn is_available(stock: u32, requested: u32) -> bool {
    requested <= stock
}

/// Stock left after withdrawing `requested` units, or `None` if that would go negative.
pub fn remaining_after(stock: u32, requested: u32) -> Option<u32> {
    stock.checked_sub(requested)
}

/// Quantity after adding a single unit, or `None` if it would exceed `stock`.
///
/// `current` is `0` for a product that is not in the cart yet.
pub fn increment_within(current: u32, stock: u32) -> Option<u32> {
    let next = current.checked_add(1)?;
    is_available(stock, next).then_some(next)
}

/// Apply `delta` to `current`, clamped to `0..=stock`.
pub fn clamp_quantity(current: u32, delta: i64, stock: u32) -> u32 {
    let target = i64::from(current).saturating_add(delta);
    // Bounded by `stock`, so the cast back is lossless.
    target.clamp(0, i64::from(stock)) as u32
}

/// `price × quantity` in minor currency units, `None` on overflow.
pub fn line_amount(price: u64, quantity: u32) -> Option<u64> {
    price.checked_mul(u64::from(quantity))
}
