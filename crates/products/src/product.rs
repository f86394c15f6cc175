use serde::{Deserialize, Serialize};

use campuscart_core::{DomainError, DomainResult, Entity, ProductId, ValueObject};

use crate::stock;

/// Product category (e.g. "snacks", "beverages"). Compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Category {}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog product with its authoritative stock count.
///
/// Stock is only lowered by the order engine (on commit) and raised by
/// restocking. Products are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProduct")]
pub struct Product {
    id: ProductId,
    name: String,
    /// Price in smallest currency unit (e.g., paise/cents).
    price: u64,
    category: Category,
    stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// Unvalidated wire/storage shape; deserialization goes through `Product::new`.
#[derive(Deserialize)]
struct RawProduct {
    id: ProductId,
    name: String,
    price: u64,
    category: String,
    stock: u32,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<RawProduct> for Product {
    type Error = DomainError;

    fn try_from(raw: RawProduct) -> Result<Self, Self::Error> {
        let product = Product::new(raw.id, raw.name, raw.price, Category::new(raw.category)?, raw.stock)?;
        Ok(match raw.description {
            Some(d) => product.with_description(d),
            None => product,
        })
    }
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: u64,
        category: Category,
        stock: u32,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            price,
            category,
            stock,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn can_fulfil(&self, quantity: u32) -> bool {
        stock::is_available(self.stock, quantity)
    }

    /// Take `quantity` units out of stock, returning the new stock.
    pub fn withdraw(&mut self, quantity: u32) -> DomainResult<u32> {
        let remaining = stock::remaining_after(self.stock, quantity).ok_or_else(|| {
            DomainError::invariant(format!(
                "stock cannot go negative (product {}, stock {}, requested {quantity})",
                self.id, self.stock
            ))
        })?;
        self.stock = remaining;
        Ok(remaining)
    }

    /// Put `quantity` units back on the shelf.
    pub fn restock(&mut self, quantity: u32) -> DomainResult<u32> {
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        Ok(self.stock)
    }

    pub fn set_price(&mut self, price: u64) {
        self.price = price;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
