//! Shopping cart lines, partitioned per identity.
//!
//! Unlike favorites, a guest cart is never merged into a user's cart:
//! switching namespace swaps the active line set wholesale.

use crate::catalog::{Catalog, QualityTier};
use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::Money;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use turbo_cache::{cache_key, Backends, Persist, SafeSerializer};

/// Maximum quantity allowed per line.
pub const MAX_QUANTITY_PER_LINE: i64 = 9999;

const CART_PREFIX: &str = "cart";

/// One line of the cart, unique by `(product_id, quality_tier)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product id.
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub name: String,
    /// Brand name.
    pub brand: String,
    /// Price per unit at the time the line was added.
    pub unit_price: Money,
    /// Tier the product is bought in.
    pub quality_tier: QualityTier,
    /// Quantity, always at least 1.
    pub quantity: i64,
}

impl CartLine {
    fn matches(&self, product_id: &ProductId, tier: QualityTier) -> bool {
        &self.product_id == product_id && self.quality_tier == tier
    }

    /// Line total (unit price times quantity).
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)
    }
}

/// The persisted line set of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLines {
    lines: Vec<CartLine>,
}

impl CartLines {
    /// Merge duplicate keys and drop non-positive quantities.
    fn normalize(&mut self) {
        let mut merged: Vec<CartLine> = Vec::with_capacity(self.lines.len());
        for line in self.lines.drain(..) {
            if line.quantity <= 0 {
                continue;
            }
            match merged
                .iter_mut()
                .find(|l| l.matches(&line.product_id, line.quality_tier))
            {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .saturating_add(line.quantity)
                        .min(MAX_QUANTITY_PER_LINE)
                }
                None => merged.push(line),
            }
        }
        self.lines = merged;
    }
}

impl Persist for CartLines {
    const KIND: &'static str = "cart";
}

/// Transaction cache: the cart lines of the active namespace.
#[derive(Debug)]
pub struct Cart {
    backends: Backends,
    serializer: SafeSerializer,
    catalog: Arc<Catalog>,
    namespace: Namespace,
    lines: CartLines,
}

impl Cart {
    /// Open the cart on the guest namespace.
    pub fn new(backends: Backends, serializer: SafeSerializer, catalog: Arc<Catalog>) -> Self {
        let mut cart = Self {
            backends,
            serializer,
            catalog,
            namespace: Namespace::guest(),
            lines: CartLines::default(),
        };
        cart.lines = cart.load(&Namespace::guest());
        cart
    }

    /// The active namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The price table.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Lines of the active namespace.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines.lines
    }

    /// Find the line for `(product_id, tier)`.
    pub fn get_line(&self, product_id: &ProductId, tier: QualityTier) -> Option<&CartLine> {
        self.lines.lines.iter().find(|l| l.matches(product_id, tier))
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.lines.is_empty()
    }

    fn key(namespace: &Namespace) -> String {
        cache_key!(CART_PREFIX, namespace)
    }

    fn load(&self, namespace: &Namespace) -> CartLines {
        match self
            .serializer
            .read_first::<CartLines>(&self.backends, &Self::key(namespace))
        {
            Ok(Some((_, mut lines))) => {
                lines.normalize();
                lines
            }
            Ok(None) => CartLines::default(),
            Err(e) => {
                tracing::warn!(namespace = %namespace, error = %e, "cart unreadable, treating as empty");
                CartLines::default()
            }
        }
    }

    fn persist(&self) {
        let report = self
            .serializer
            .write_ordered(&self.backends, &Self::key(&self.namespace), &self.lines);
        for warning in report.warnings() {
            tracing::warn!(namespace = %self.namespace, error = %warning, "cart write degraded");
        }
    }

    /// Add one unit of `(product_id, tier)`.
    ///
    /// Increments an existing line, otherwise appends a new line priced from
    /// the catalog. Returns the resulting quantity.
    pub fn add_item(&mut self, product_id: &ProductId, tier: QualityTier) -> Result<i64, CommerceError> {
        if let Some(line) = self
            .lines
            .lines
            .iter_mut()
            .find(|l| l.matches(product_id, tier))
        {
            let quantity = line.quantity.checked_add(1).ok_or(CommerceError::Overflow)?;
            if quantity > MAX_QUANTITY_PER_LINE {
                return Err(CommerceError::QuantityExceedsLimit(quantity, MAX_QUANTITY_PER_LINE));
            }
            line.quantity = quantity;
            self.persist();
            tracing::debug!(product = %product_id, tier = %tier, quantity, "cart line incremented");
            return Ok(quantity);
        }

        let quote = self.catalog.quote(product_id, tier)?;
        let line = CartLine {
            product_id: product_id.clone(),
            name: quote.entry.name.clone(),
            brand: quote.entry.brand.clone(),
            unit_price: quote.unit_price,
            quality_tier: tier,
            quantity: 1,
        };
        self.lines.lines.push(line);
        self.persist();
        tracing::debug!(product = %product_id, tier = %tier, "cart line added");
        Ok(1)
    }

    /// Set the quantity of an existing line.
    ///
    /// A quantity of zero or less removes the line. Returns `false` if no
    /// such line exists.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        tier: QualityTier,
        quantity: i64,
    ) -> Result<bool, CommerceError> {
        if quantity <= 0 {
            return Ok(self.remove_item(product_id, tier));
        }
        if quantity > MAX_QUANTITY_PER_LINE {
            return Err(CommerceError::QuantityExceedsLimit(quantity, MAX_QUANTITY_PER_LINE));
        }

        match self
            .lines
            .lines
            .iter_mut()
            .find(|l| l.matches(product_id, tier))
        {
            Some(line) => {
                line.quantity = quantity;
                self.persist();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the line for `(product_id, tier)`.
    pub fn remove_item(&mut self, product_id: &ProductId, tier: QualityTier) -> bool {
        let len_before = self.lines.lines.len();
        self.lines.lines.retain(|l| !l.matches(product_id, tier));
        let removed = self.lines.lines.len() < len_before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Remove every line of the active namespace.
    pub fn clear(&mut self) {
        self.lines = CartLines::default();
        self.persist();
    }

    /// Persist the active lines, then make `namespace` active.
    pub fn switch_namespace(&mut self, namespace: Namespace) {
        if namespace == self.namespace {
            return;
        }
        self.persist();
        self.lines = self.load(&namespace);
        tracing::debug!(from = %self.namespace, to = %namespace, lines = self.lines.lines.len(), "switched cart namespace");
        self.namespace = namespace;
    }

    /// Delete a namespace's cart from both backends.
    pub fn purge_namespace(&mut self, namespace: &Namespace) -> Result<(), CommerceError> {
        self.backends.remove_everywhere(&Self::key(namespace))?;
        if namespace == &self.namespace {
            self.lines = CartLines::default();
        }
        tracing::info!(namespace = %namespace, "cart purged");
        Ok(())
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Result<Money, CommerceError> {
        let line_totals = self
            .lines()
            .iter()
            .map(CartLine::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        Money::try_sum(line_totals, self.catalog.currency).ok_or(CommerceError::Overflow)
    }

    /// Sum of all quantities.
    pub fn item_count(&self) -> i64 {
        self.lines().iter().map(|l| l.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use turbo_cache::Backend;

    fn cart() -> Cart {
        Cart::new(
            Backends::in_memory(),
            SafeSerializer::default(),
            Arc::new(Catalog::default()),
        )
    }

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_add_same_item_twice_increments() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        let quantity = cart.add_item(&id("layton"), QualityTier::Top).unwrap();

        assert_eq!(quantity, 2);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.get_line(&id("layton"), QualityTier::Top).unwrap().quantity, 2);
    }

    #[test]
    fn test_tiers_are_distinct_lines() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        cart.add_item(&id("layton"), QualityTier::Standard).unwrap();
        assert_eq!(cart.lines().len(), 2);
    }

    #[test]
    fn test_add_prices_from_catalog() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Premium).unwrap();
        let line = cart.get_line(&id("layton"), QualityTier::Premium).unwrap();
        assert_eq!(line.name, "Layton");
        assert_eq!(line.brand, "Parfums de Marly");
        assert_eq!(line.unit_price, Money::new(8900, Currency::USD));
    }

    #[test]
    fn test_add_unknown_product() {
        let mut cart = cart();
        let err = cart.add_item(&id("nope"), QualityTier::Top).unwrap_err();
        assert!(matches!(err, CommerceError::ProductNotFound(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        assert!(cart.update_quantity(&id("layton"), QualityTier::Top, 0).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_in_place() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        assert!(cart.update_quantity(&id("layton"), QualityTier::Top, 5).unwrap());
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_update_missing_line() {
        let mut cart = cart();
        assert!(!cart.update_quantity(&id("layton"), QualityTier::Top, 3).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_limit() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        let err = cart
            .update_quantity(&id("layton"), QualityTier::Top, MAX_QUANTITY_PER_LINE + 1)
            .unwrap_err();
        assert!(matches!(err, CommerceError::QuantityExceedsLimit(_, _)));

        cart.update_quantity(&id("layton"), QualityTier::Top, MAX_QUANTITY_PER_LINE)
            .unwrap();
        assert!(cart.add_item(&id("layton"), QualityTier::Top).is_err());
    }

    #[test]
    fn test_totals() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();
        cart.add_item(&id("sedley"), QualityTier::Standard).unwrap();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total().unwrap(), Money::new(14900 * 2 + 3900, Currency::USD));
    }

    #[test]
    fn test_empty_total() {
        let cart = cart();
        assert_eq!(cart.total().unwrap(), Money::zero(Currency::USD));
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_switch_namespace_swaps_without_merge() {
        let mut cart = cart();
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();

        cart.switch_namespace(Namespace::for_email("u@example.com"));
        assert!(cart.is_empty());
        cart.add_item(&id("herod"), QualityTier::Premium).unwrap();

        cart.switch_namespace(Namespace::guest());
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.get_line(&id("layton"), QualityTier::Top).is_some());

        cart.switch_namespace(Namespace::for_email("u@example.com"));
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.get_line(&id("herod"), QualityTier::Premium).is_some());
    }

    #[test]
    fn test_cart_survives_new_instance() {
        let backends = Backends::in_memory();
        let catalog = Arc::new(Catalog::default());
        let mut cart = Cart::new(backends.clone(), SafeSerializer::default(), catalog.clone());
        cart.add_item(&id("delina"), QualityTier::Top).unwrap();

        let reopened = Cart::new(backends, SafeSerializer::default(), catalog);
        assert_eq!(reopened.item_count(), 1);
    }

    #[test]
    fn test_duplicate_lines_merged_on_load() {
        let backends = Backends::in_memory();
        let line = CartLine {
            product_id: id("layton"),
            name: "Layton".to_string(),
            brand: "Parfums de Marly".to_string(),
            unit_price: Money::new(14900, Currency::USD),
            quality_tier: QualityTier::Top,
            quantity: 1,
        };
        let stored = CartLines {
            lines: vec![line.clone(), line],
        };
        SafeSerializer::default().write(backends.store(Backend::Ephemeral), "cart:guest", &stored);

        let cart = Cart::new(backends, SafeSerializer::default(), Arc::new(Catalog::default()));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_purge_namespace() {
        let backends = Backends::in_memory();
        let mut cart = Cart::new(backends.clone(), SafeSerializer::default(), Arc::new(Catalog::default()));
        cart.switch_namespace(Namespace::for_email("u@example.com"));
        cart.add_item(&id("layton"), QualityTier::Top).unwrap();

        cart.purge_namespace(&Namespace::for_email("u@example.com")).unwrap();
        assert!(cart.is_empty());
        assert!(backends.read_first("cart:u@example.com").unwrap().is_none());
    }
}
