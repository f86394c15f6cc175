use std::collections::HashMap;

use serde::Serialize;

use campuscart_core::{Entity, ProductId};
use campuscart_products::{Product, stock};
use campuscart_sales::LineItem;

use crate::events::{CartEvent, CartObserver};

/// A product snapshot plus the desired quantity.
///
/// Invariant: `1 <= quantity <= product.stock()` as of the last snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    product: Product,
    quantity: u32,
}

impl CartLine {
    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn product_id(&self) -> &ProductId {
        self.product.id()
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn amount(&self) -> u64 {
        stock::line_amount(self.product.price(), self.quantity).unwrap_or(u64::MAX)
    }
}

/// Read-only view of a cart at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub total_quantity: u64,
    pub total_amount: u64,
    pub open: bool,
}

/// Cart state machine for a single session.
///
/// Every operation is total: nothing here returns an error. Requests that
/// would breach the stock ceiling are ignored.
#[derive(Default)]
pub struct CartManager {
    lines: HashMap<ProductId, CartLine>,
    open: bool,
    observer: Option<Box<dyn CartObserver>>,
}

impl core::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartManager")
            .field("lines", &self.lines)
            .field("open", &self.open)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl CartManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: impl CartObserver + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            ..Self::default()
        }
    }

    pub fn set_observer(&mut self, observer: impl CartObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Add one unit of `product`.
    ///
    /// A new line starts at quantity 1; an existing line grows by 1. Either is
    /// ignored when the result would exceed `product.stock()`. An accepted add
    /// refreshes the line's snapshot and opens the cart view.
    pub fn add(&mut self, product: &Product) {
        let id = product.id().clone();
        let current = self.lines.get(&id).map_or(0, |l| l.quantity);

        let Some(next) = stock::increment_within(current, product.stock()) else {
            tracing::debug!(product_id = %id, stock = product.stock(), "add ignored: stock ceiling");
            self.emit(CartEvent::AddRejected {
                product_id: id,
                stock: product.stock(),
            });
            return;
        };

        self.lines.insert(
            id.clone(),
            CartLine {
                product: product.clone(),
                quantity: next,
            },
        );
        self.open = true;

        if current == 0 {
            self.emit(CartEvent::Added {
                product_id: id,
                quantity: next,
            });
        } else {
            self.emit(CartEvent::QuantityChanged {
                product_id: id,
                from: current,
                to: next,
            });
        }
    }

    /// Adjust a line by `delta`, clamped to `0..=stock` of its snapshot.
    ///
    /// Reaching zero removes the line. Unknown ids are ignored.
    pub fn set_quantity(&mut self, product_id: &ProductId, delta: i64) {
        let Some(line) = self.lines.get_mut(product_id) else {
            return;
        };

        let from = line.quantity;
        let to = stock::clamp_quantity(from, delta, line.product.stock());
        if to == 0 {
            self.lines.remove(product_id);
            self.emit(CartEvent::Removed {
                product_id: product_id.clone(),
            });
        } else if to != from {
            line.quantity = to;
            self.emit(CartEvent::QuantityChanged {
                product_id: product_id.clone(),
                from,
                to,
            });
        }
    }

    /// Drop a line regardless of its quantity.
    pub fn remove(&mut self, product_id: &ProductId) {
        if self.lines.remove(product_id).is_some() {
            self.emit(CartEvent::Removed {
                product_id: product_id.clone(),
            });
        }
    }

    /// Empty the cart and close the cart view.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.open = false;
        self.emit(CartEvent::Cleared);
    }

    /// Refresh snapshots from freshly fetched products.
    ///
    /// Quantities above the new stock are lowered to it; lines whose product
    /// is now out of stock are removed. Products not in the cart are ignored.
    pub fn sync<'a>(&mut self, products: impl IntoIterator<Item = &'a Product>) {
        for product in products {
            let id = product.id();
            let Some(line) = self.lines.get_mut(id) else {
                continue;
            };

            let from = line.quantity;
            let to = stock::clamp_quantity(from, 0, product.stock());
            line.product = product.clone();

            if to == 0 {
                self.lines.remove(id);
                self.emit(CartEvent::Removed {
                    product_id: id.clone(),
                });
            } else if to != from {
                line.quantity = to;
                self.emit(CartEvent::QuantityChanged {
                    product_id: id.clone(),
                    from,
                    to,
                });
            }
        }
    }

    /// Finalized line list for the order engine, sorted by product id.
    pub fn checkout_lines(&self) -> Vec<LineItem> {
        self.lines()
            .into_iter()
            .map(|l| LineItem::from_product(&l.product, l.quantity))
            .collect()
    }

    /// Discard the cart after its order committed.
    pub fn complete_checkout(&mut self) {
        self.clear();
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.values().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn total_amount(&self) -> u64 {
        self.lines
            .values()
            .fold(0u64, |acc, l| acc.saturating_add(l.amount()))
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.get(product_id)
    }

    /// Lines sorted by product id.
    pub fn lines(&self) -> Vec<&CartLine> {
        let mut lines: Vec<&CartLine> = self.lines.values().collect();
        lines.sort_by(|a, b| a.product_id().cmp(b.product_id()));
        lines
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines().into_iter().cloned().collect(),
            total_quantity: self.total_quantity(),
            total_amount: self.total_amount(),
            open: self.open,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    fn emit(&self, event: CartEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use campuscart_products::Category;

    fn product(id: &str, price: u64, stock: u32) -> Product {
        Product::new(
            ProductId::parse(id).unwrap(),
            format!("product {id}"),
            price,
            Category::new("snacks").unwrap(),
            stock,
        )
        .unwrap()
    }

    fn pid(id: &str) -> ProductId {
        ProductId::parse(id).unwrap()
    }

    fn recording_cart() -> (CartManager, Arc<Mutex<Vec<CartEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let cart = CartManager::with_observer(move |e: &CartEvent| sink.lock().unwrap().push(e.clone()));
        (cart, events)
    }

    #[test]
    fn add_caps_quantity_at_stock() {
        let mut cart = CartManager::new();
        let p = product("p1", 100, 3);

        for _ in 0..3 {
            cart.add(&p);
        }
        assert_eq!(cart.line(&pid("p1")).unwrap().quantity(), 3);

        cart.add(&p);
        assert_eq!(cart.line(&pid("p1")).unwrap().quantity(), 3);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn add_out_of_stock_product_is_noop() {
        let (mut cart, events) = recording_cart();
        cart.add(&product("p1", 100, 0));

        assert!(cart.is_empty());
        assert!(!cart.is_open());
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[CartEvent::AddRejected {
                product_id: pid("p1"),
                stock: 0
            }]
        );
    }

    #[test]
    fn add_opens_cart_view() {
        let mut cart = CartManager::new();
        assert!(!cart.is_open());
        cart.add(&product("p1", 100, 1));
        assert!(cart.is_open());
    }

    #[test]
    fn large_negative_delta_removes_line() {
        let mut cart = CartManager::new();
        let p = product("p1", 100, 5);
        cart.add(&p);
        cart.add(&p);
        cart.add(&product("p2", 40, 5));

        cart.set_quantity(&pid("p1"), -100);

        assert!(cart.line(&pid("p1")).is_none());
        assert_eq!(cart.total_quantity(), 1);
        assert_eq!(cart.total_amount(), 40);
    }

    #[test]
    fn positive_delta_is_clamped_to_snapshot_stock() {
        let mut cart = CartManager::new();
        cart.add(&product("p1", 100, 4));
        cart.set_quantity(&pid("p1"), 10);
        assert_eq!(cart.line(&pid("p1")).unwrap().quantity(), 4);

        cart.set_quantity(&pid("p1"), -1);
        assert_eq!(cart.line(&pid("p1")).unwrap().quantity(), 3);
    }

    #[test]
    fn set_quantity_on_unknown_line_is_noop() {
        let (mut cart, events) = recording_cart();
        cart.set_quantity(&pid("missing"), 3);
        assert!(cart.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn totals_sum_price_times_quantity() {
        let mut cart = CartManager::new();
        let a = product("a", 250, 10);
        let b = product("b", 100, 10);
        cart.add(&a);
        cart.add(&a);
        cart.add(&b);

        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.total_amount(), 600);

        let snap = cart.snapshot();
        assert_eq!(snap.total_amount, 600);
        assert_eq!(snap.lines.len(), 2);
    }

    #[test]
    fn clear_empties_and_closes() {
        let (mut cart, events) = recording_cart();
        cart.add(&product("p1", 100, 2));
        cart.clear();

        assert!(cart.is_empty());
        assert!(!cart.is_open());
        assert_eq!(events.lock().unwrap().last(), Some(&CartEvent::Cleared));
    }

    #[test]
    fn sync_clamps_and_drops_sold_out_lines() {
        let mut cart = CartManager::new();
        let a = product("a", 100, 5);
        let b = product("b", 100, 5);
        for _ in 0..4 {
            cart.add(&a);
        }
        cart.add(&b);

        cart.sync([&product("a", 120, 2), &product("b", 100, 0), &product("c", 1, 9)]);

        let line = cart.line(&pid("a")).unwrap();
        assert_eq!(line.quantity(), 2);
        assert_eq!(line.product().price(), 120);
        assert!(cart.line(&pid("b")).is_none());
        assert!(cart.line(&pid("c")).is_none());
    }

    #[test]
    fn checkout_lines_are_sorted_and_priced_from_snapshot() {
        let mut cart = CartManager::new();
        cart.add(&product("zeta", 10, 3));
        cart.add(&product("alpha", 20, 3));
        cart.add(&product("alpha", 20, 3));

        let lines = cart.checkout_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, pid("alpha"));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].unit_price, 20);
        assert_eq!(lines[1].product_id, pid("zeta"));
    }

    #[test]
    fn observer_sees_changes_in_order() {
        let (mut cart, events) = recording_cart();
        let p = product("p1", 100, 2);
        cart.add(&p);
        cart.add(&p);
        cart.add(&p);
        cart.set_quantity(&pid("p1"), -5);

        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[
                CartEvent::Added { product_id: pid("p1"), quantity: 1 },
                CartEvent::QuantityChanged { product_id: pid("p1"), from: 1, to: 2 },
                CartEvent::AddRejected { product_id: pid("p1"), stock: 2 },
                CartEvent::Removed { product_id: pid("p1") },
            ]
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(usize),
            Delta(usize, i64),
            Remove(usize),
            Clear,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0usize..4).prop_map(Op::Add),
                3 => (0usize..4, -6i64..6).prop_map(|(i, d)| Op::Delta(i, d)),
                1 => (0usize..4).prop_map(Op::Remove),
                1 => Just(Op::Clear),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: every line stays within `1..=stock` whatever the operation sequence.
            #[test]
            fn quantities_stay_within_stock(
                stocks in proptest::collection::vec(0u32..5, 4),
                ops in proptest::collection::vec(op(), 0..60)
            ) {
                let products: Vec<Product> = stocks
                    .iter()
                    .enumerate()
                    .map(|(i, s)| product(&format!("p{i}"), 100, *s))
                    .collect();
                let mut cart = CartManager::new();

                for op in ops {
                    match op {
                        Op::Add(i) => cart.add(&products[i]),
                        Op::Delta(i, d) => cart.set_quantity(products[i].id(), d),
                        Op::Remove(i) => cart.remove(products[i].id()),
                        Op::Clear => cart.clear(),
                    }

                    for line in cart.lines() {
                        prop_assert!(line.quantity() >= 1);
                        prop_assert!(line.quantity() <= line.product().stock());
                    }
                    let sum: u64 = cart.lines().iter().map(|l| u64::from(l.quantity())).sum();
                    prop_assert_eq!(cart.total_quantity(), sum);
                }
            }
        }
    }
}
