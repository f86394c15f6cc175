use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campuscart_core::{DomainError, DomainResult, Entity, OrderId, ProductId, UserId, ValueObject};
use campuscart_products::{Product, stock};

/// Order status lifecycle.
///
/// The order engine only ever produces `Confirmed`; the other states are set
/// by fulfilment tooling outside this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// Delivery destination: hostel + room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub hostel: String,
    pub room: String,
}

impl Destination {
    pub fn new(hostel: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            hostel: hostel.into(),
            room: room.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.hostel.trim().is_empty() {
            return Err(DomainError::validation("hostel cannot be empty"));
        }
        if self.room.trim().is_empty() {
            return Err(DomainError::validation("room cannot be empty"));
        }
        Ok(())
    }
}

impl ValueObject for Destination {}

/// A requested line: what the customer saw in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    /// Price in smallest currency unit, as last seen by the customer.
    pub unit_price: u64,
    pub quantity: u32,
}

impl LineItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id().clone(),
            name: product.name().to_string(),
            unit_price: product.price(),
            quantity,
        }
    }

    pub fn amount(&self) -> Option<u64> {
        stock::line_amount(self.unit_price, self.quantity)
    }
}

impl ValueObject for LineItem {}

/// Request consumed by the order engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub lines: Vec<LineItem>,
    pub destination: Destination,
    /// Client-computed total, cross-checked against the lines.
    pub expected_total: u64,
}

impl PlaceOrder {
    /// Shape validation. Runs before the store is touched.
    ///
    /// Returns the total computed from the submitted lines.
    pub fn validate(&self) -> DomainResult<u64> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }
        self.destination.validate()?;

        let mut seen = HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be positive",
                    line.product_id
                )));
            }
            if !seen.insert(&line.product_id) {
                return Err(DomainError::validation(format!(
                    "product {} appears on more than one line",
                    line.product_id
                )));
            }
        }

        let total = sum_lines(self.lines.iter().map(|l| (l.unit_price, l.quantity)))?;
        if total != self.expected_total {
            return Err(DomainError::validation(format!(
                "expected total {} does not match line total {total}",
                self.expected_total
            )));
        }
        Ok(total)
    }
}

/// Immutable snapshot of a purchased line.
///
/// Carries the price at time of purchase. Never a live reference to the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderLine {
    pub fn amount(&self) -> u64 {
        // Totals are checked for overflow when the order is built.
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

impl From<&LineItem> for OrderLine {
    fn from(line: &LineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

impl ValueObject for OrderLine {}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    lines: Vec<OrderLine>,
    total: u64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    destination: Destination,
}

impl Order {
    /// Build a confirmed order, checking the total against the line snapshots.
    pub fn confirmed(
        id: OrderId,
        user_id: UserId,
        lines: Vec<OrderLine>,
        destination: Destination,
        total: u64,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }
        destination.validate()?;

        let computed = sum_lines(lines.iter().map(|l| (l.unit_price, l.quantity)))?;
        if computed != total {
            return Err(DomainError::invariant(format!(
                "order total {total} does not equal sum of lines {computed}"
            )));
        }

        Ok(Self {
            id,
            user_id,
            lines,
            total,
            status: OrderStatus::Confirmed,
            created_at,
            destination,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Quantity of `product_id` on this order (0 if absent).
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.lines
            .iter()
            .filter(|l| &l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// Restore a stored status when rehydrating from persistence.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn sum_lines(mut lines: impl Iterator<Item = (u64, u32)>) -> DomainResult<u64> {
    lines.try_fold(0u64, |acc, (price, quantity)| {
        stock::line_amount(price, quantity)
            .and_then(|amount| acc.checked_add(amount))
            .ok_or_else(|| DomainError::validation("order total overflows"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn user() -> UserId {
        UserId::parse("usr_test").unwrap()
    }

    fn line(id: &str, price: u64, qty: u32) -> LineItem {
        LineItem {
            product_id: pid(id),
            name: format!("product {id}"),
            unit_price: price,
            quantity: qty,
        }
    }

    fn request(lines: Vec<LineItem>, total: u64) -> PlaceOrder {
        PlaceOrder {
            user_id: user(),
            lines,
            destination: Destination::new("Block C", "214"),
            expected_total: total,
        }
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let req = request(vec![line("p1", 200, 2), line("p2", 50, 1)], 450);
        assert_eq!(req.validate().unwrap(), 450);
    }

    #[test]
    fn validate_rejects_empty_lines() {
        let err = request(vec![], 0).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("at least one line")));
    }

    #[test]
    fn validate_rejects_blank_destination_fields() {
        let mut req = request(vec![line("p1", 100, 1)], 100);
        req.destination.room = "  ".into();
        assert!(matches!(req.validate(), Err(DomainError::Validation(msg)) if msg.contains("room")));

        req.destination = Destination::new("", "12");
        assert!(matches!(req.validate(), Err(DomainError::Validation(msg)) if msg.contains("hostel")));
    }

    #[test]
    fn validate_rejects_total_mismatch() {
        let err = request(vec![line("p1", 100, 3)], 250).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("does not match")));
    }

    #[test]
    fn line_sum_overflow_is_a_validation_error() {
        let err = request(vec![line("p1", u64::MAX, 2)], 0).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("overflows")));

        let err = request(vec![line("p1", u64::MAX, 1), line("p2", 1, 1)], 0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("overflows")));
    }

    #[test]
    fn validate_rejects_zero_quantity_and_duplicates() {
        assert!(request(vec![line("p1", 100, 0)], 0).validate().is_err());
        assert!(request(vec![line("p1", 100, 1), line("p1", 100, 1)], 200).validate().is_err());
    }

    #[test]
    fn confirmed_order_checks_total() {
        let lines = vec![OrderLine::from(&line("p1", 120, 2))];
        let dest = Destination::new("Block C", "214");

        let order = Order::confirmed(OrderId::generate(), user(), lines.clone(), dest.clone(), 240, Utc::now())
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.total_quantity(), 2);
        assert_eq!(order.quantity_of(&pid("p1")), 2);
        assert_eq!(order.quantity_of(&pid("p2")), 0);

        let err = Order::confirmed(OrderId::generate(), user(), lines, dest, 239, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_json_uses_lowercase_status() {
        let lines = vec![OrderLine::from(&line("p1", 100, 1))];
        let order = Order::confirmed(
            OrderId::generate(),
            user(),
            lines,
            Destination::new("Block A", "1"),
            100,
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "confirmed");
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a request whose expected total is the line sum always validates to that sum.
            #[test]
            fn matching_total_validates(
                parts in proptest::collection::vec((1u64..10_000, 1u32..50), 1..8)
            ) {
                let lines: Vec<LineItem> = parts
                    .iter()
                    .enumerate()
                    .map(|(i, (price, qty))| line(&format!("p{i}"), *price, *qty))
                    .collect();
                let total: u64 = parts.iter().map(|(p, q)| p * u64::from(*q)).sum();
                prop_assert_eq!(request(lines.clone(), total).validate().unwrap(), total);
                prop_assert!(request(lines, total + 1).validate().is_err());
            }
        }
    }
}
