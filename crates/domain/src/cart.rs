//! Cart items, product variants and variant pricing.

use common::{Money, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::path::file_name_from_reference;

/// Unit price of a solid-fill design, in cents.
pub const SOLID_PRICE_CENTS: i64 = 599;

/// Unit price of a text design, in cents.
pub const TEXT_PRICE_CENTS: i64 = 599;

/// Unit price of a custom design, in cents.
pub const CUSTOM_PRICE_CENTS: i64 = 799;

/// The kind of design a cart item was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductVariant {
    Solid,
    Text,
    Custom,
}

impl ProductVariant {
    /// Returns the per-unit price of this variant.
    pub fn unit_price(&self) -> Money {
        match self {
            ProductVariant::Solid => Money::from_cents(SOLID_PRICE_CENTS),
            ProductVariant::Text => Money::from_cents(TEXT_PRICE_CENTS),
            ProductVariant::Custom => Money::from_cents(CUSTOM_PRICE_CENTS),
        }
    }

    /// Returns the variant name as stored in `cart_items.template_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductVariant::Solid => "solid",
            ProductVariant::Text => "text",
            ProductVariant::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ProductVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductVariant {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "solid" => Ok(ProductVariant::Solid),
            "text" => Ok(ProductVariant::Text),
            "custom" => Ok(ProductVariant::Custom),
            other => Err(DomainError::UnknownVariant(other.to_string())),
        }
    }
}

/// A generated model staged in a browser session's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub session_id: SessionId,
    /// URL or key of the generated model file.
    pub asset_reference: String,
    pub quantity: u32,
    pub variant: ProductVariant,
}

impl CartItem {
    /// Creates a new cart item.
    pub fn new(
        session_id: impl Into<SessionId>,
        asset_reference: impl Into<String>,
        quantity: u32,
        variant: ProductVariant,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            asset_reference: asset_reference.into(),
            quantity,
            variant,
        }
    }

    /// Returns the model's file name, taken from the end of its reference.
    pub fn file_name(&self) -> &str {
        file_name_from_reference(&self.asset_reference)
    }
}

/// Prices a cart from its (variant, quantity) lines.
///
/// Fails on an empty cart, on any zero quantity, and if the total is not
/// positive.
pub fn price_cart<I>(lines: I) -> Result<Money>
where
    I: IntoIterator<Item = (ProductVariant, u32)>,
{
    let mut total = Money::zero();
    let mut seen = false;

    for (variant, quantity) in lines {
        seen = true;
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        total += variant.unit_price().multiply(quantity);
    }

    if !seen {
        return Err(DomainError::EmptyCart);
    }
    if !total.is_positive() {
        return Err(DomainError::InvalidAmount(total));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_prices() {
        assert_eq!(ProductVariant::Solid.unit_price().cents(), 599);
        assert_eq!(ProductVariant::Text.unit_price().cents(), 599);
        assert_eq!(ProductVariant::Custom.unit_price().cents(), 799);
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("custom".parse::<ProductVariant>(), Ok(ProductVariant::Custom));
        assert!(matches!(
            "glitter".parse::<ProductVariant>(),
            Err(DomainError::UnknownVariant(v)) if v == "glitter"
        ));
    }

    #[test]
    fn test_variant_serde_is_lowercase() {
        let json = serde_json::to_string(&ProductVariant::Text).unwrap();
        assert_eq!(json, "\"text\"");
    }

    #[test]
    fn test_price_cart_sums_lines() {
        let total = price_cart([(ProductVariant::Solid, 2), (ProductVariant::Custom, 1)]).unwrap();
        assert_eq!(total.cents(), 599 * 2 + 799);
    }

    #[test]
    fn test_price_cart_rejects_empty_and_zero_quantity() {
        assert_eq!(price_cart([]), Err(DomainError::EmptyCart));
        assert_eq!(
            price_cart([(ProductVariant::Text, 0)]),
            Err(DomainError::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn test_cart_item_file_name() {
        let item = CartItem::new(
            "abc123",
            "https://api.example.com/output/abc123/design.stl",
            2,
            ProductVariant::Solid,
        );
        assert_eq!(item.file_name(), "design.stl");
    }
}
