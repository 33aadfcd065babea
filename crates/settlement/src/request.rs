//! Inbound settlement requests.

use common::{BuyerId, Money, Quantity};

use crate::error::SettlementError;

/// How a line item names its product: a storage identifier, a display
/// name, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRef {
    id: Option<String>,
    name: Option<String>,
}

impl ProductRef {
    /// Builds a reference, dropping blank values.
    pub fn new(id: Option<String>, name: Option<String>) -> Self {
        Self {
            id: non_blank(id),
            name: non_blank(name),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Some(id.into()), None)
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(None, Some(name.into()))
    }

    /// Canonicalizes the several keys a client may use for the same thing.
    ///
    /// Keys are given in priority order; the first non-blank identifier and
    /// the first non-blank name win.
    pub fn from_keys<'a, A, B>(id_keys: A, name_keys: B) -> Self
    where
        A: IntoIterator<Item = Option<&'a str>>,
        B: IntoIterator<Item = Option<&'a str>>,
    {
        Self {
            id: first_non_blank(id_keys),
            name: first_non_blank(name_keys),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_non_blank<'a>(keys: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    keys.into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
        .map(str::to_owned)
}

/// One requested product and quantity within a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub product_ref: ProductRef,
    pub quantity: Quantity,
    /// Unit price the client displayed, honoured over the catalog price.
    pub asserted_unit_price: Option<Money>,
}

impl LineItem {
    pub fn new(product_ref: ProductRef, quantity: Quantity) -> Self {
        Self {
            product_ref,
            quantity,
            asserted_unit_price: None,
        }
    }

    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.asserted_unit_price = Some(price);
        self
    }

    /// Validates raw client values for the item at position `index`.
    pub fn from_raw(
        index: usize,
        product_ref: ProductRef,
        quantity: i64,
        asserted_unit_price_cents: Option<i64>,
    ) -> Result<Self, SettlementError> {
        let quantity = Quantity::new(quantity)
            .map_err(|source| SettlementError::InvalidQuantity { index, source })?;
        let asserted_unit_price = match asserted_unit_price_cents {
            Some(cents) if cents < 0 => {
                return Err(SettlementError::NegativeAmount(format!(
                    "item {index} unit price"
                )));
            }
            Some(cents) => Some(Money::from_cents(cents)),
            None => None,
        };
        Ok(Self {
            product_ref,
            quantity,
            asserted_unit_price,
        })
    }
}

/// A validated checkout: at least one item, no negative amounts.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    buyer: BuyerId,
    items: Vec<LineItem>,
    declared_total: Money,
    shipping_cost: Money,
}

impl CheckoutRequest {
    pub fn new(
        buyer: BuyerId,
        items: Vec<LineItem>,
        declared_total: Money,
        shipping_cost: Money,
    ) -> Result<Self, SettlementError> {
        if items.is_empty() {
            return Err(SettlementError::EmptyCheckout);
        }
        if declared_total.is_negative() {
            return Err(SettlementError::NegativeAmount("total".to_string()));
        }
        if shipping_cost.is_negative() {
            return Err(SettlementError::NegativeAmount("shipping cost".to_string()));
        }
        if let Some(index) = items
            .iter()
            .position(|item| item.asserted_unit_price.is_some_and(|p| p.is_negative()))
        {
            return Err(SettlementError::NegativeAmount(format!(
                "item {index} unit price"
            )));
        }

        Ok(Self {
            buyer,
            items,
            declared_total,
            shipping_cost,
        })
    }

    pub fn buyer(&self) -> &BuyerId {
        &self.buyer
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn declared_total(&self) -> Money {
        self.declared_total
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }
}

/// A single-item sale outside any checkout. Values arrive unvalidated.
#[derive(Debug, Clone)]
pub struct DirectSaleRequest {
    pub buyer: BuyerId,
    pub product_id: String,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LineItem {
        LineItem::new(ProductRef::by_name("Mouse"), Quantity::new(1).unwrap())
    }

    #[test]
    fn from_keys_takes_first_non_blank() {
        let r = ProductRef::from_keys(
            [None, Some("  "), Some("abc"), Some("def")],
            [Some(""), Some("Mouse")],
        );
        assert_eq!(r.id(), Some("abc"));
        assert_eq!(r.name(), Some("Mouse"));

        let empty = ProductRef::from_keys([None, Some(" ")], [None]);
        assert!(empty.is_empty());
    }

    #[test]
    fn new_drops_blank_values() {
        let r = ProductRef::new(Some(" ".into()), Some("Mouse".into()));
        assert_eq!(r.id(), None);
        assert_eq!(r.name(), Some("Mouse"));
    }

    #[test]
    fn empty_checkout_is_rejected() {
        let err = CheckoutRequest::new(BuyerId::anonymous(), vec![], Money::zero(), Money::zero())
            .unwrap_err();
        assert_eq!(err, SettlementError::EmptyCheckout);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let total = CheckoutRequest::new(
            BuyerId::anonymous(),
            vec![item()],
            Money::from_cents(-1),
            Money::zero(),
        );
        assert!(matches!(total, Err(SettlementError::NegativeAmount(_))));

        let price = CheckoutRequest::new(
            BuyerId::anonymous(),
            vec![item(), item().with_unit_price(Money::from_cents(-5))],
            Money::zero(),
            Money::zero(),
        );
        assert_eq!(
            price.unwrap_err(),
            SettlementError::NegativeAmount("item 1 unit price".into())
        );
    }

    #[test]
    fn from_raw_reports_item_index() {
        let err = LineItem::from_raw(3, ProductRef::by_name("Mouse"), 0, None).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidQuantity { index: 3, .. }));

        let ok = LineItem::from_raw(0, ProductRef::by_name("Mouse"), 2, Some(1500)).unwrap();
        assert_eq!(ok.quantity.get(), 2);
        assert_eq!(ok.asserted_unit_price, Some(Money::from_cents(1500)));
    }
}
