//! Static price table keyed by product and quality tier.

use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Quality tier a product is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Standard,
    Premium,
    Top,
}

impl QualityTier {
    /// Get tier as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Standard => "standard",
            QualityTier::Premium => "premium",
            QualityTier::Top => "top",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(QualityTier::Standard),
            "premium" => Ok(QualityTier::Premium),
            "top" => Ok(QualityTier::Top),
            other => Err(CommerceError::UnknownTier(other.to_string())),
        }
    }
}

/// One product in the price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Product id.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Brand name.
    pub brand: String,
    /// Price in cents for each tier the product is sold in.
    pub prices: BTreeMap<QualityTier, i64>,
}

/// Result of a price lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote<'a> {
    /// The product.
    pub entry: &'a CatalogEntry,
    /// Unit price for the requested tier.
    pub unit_price: Money,
}

/// Price table the cart looks prices up in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Currency every price is quoted in.
    #[serde(default)]
    pub currency: Currency,
    /// Products by id.
    #[serde(default)]
    pub products: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from entries.
    pub fn new(currency: Currency, products: Vec<CatalogEntry>) -> Self {
        Self { currency, products }
    }

    /// Find a product.
    pub fn get(&self, product_id: &ProductId) -> Option<&CatalogEntry> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }

    /// Display name for a product, if known.
    pub fn name_of(&self, product_id: &ProductId) -> Option<&str> {
        self.get(product_id).map(|p| p.name.as_str())
    }

    /// Look up the unit price of `(product_id, tier)`.
    pub fn quote(&self, product_id: &ProductId, tier: QualityTier) -> Result<PriceQuote<'_>, CommerceError> {
        let entry = self
            .get(product_id)
            .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()))?;
        let cents = entry
            .prices
            .get(&tier)
            .ok_or_else(|| CommerceError::TierNotPriced {
                product_id: product_id.to_string(),
                tier: tier.to_string(),
            })?;
        Ok(PriceQuote {
            entry,
            unit_price: Money::new(*cents, self.currency),
        })
    }
}

impl Default for Catalog {
    /// The built-in fragrance price table.
    fn default() -> Self {
        const BRAND: &str = "Parfums de Marly";
        let product = |id: &str, name: &str, standard: i64, premium: i64, top: i64| CatalogEntry {
            product_id: ProductId::new(id),
            name: name.to_string(),
            brand: BRAND.to_string(),
            prices: BTreeMap::from([
                (QualityTier::Standard, standard),
                (QualityTier::Premium, premium),
                (QualityTier::Top, top),
            ]),
        };

        Self::new(
            Currency::USD,
            vec![
                product("layton", "Layton", 4500, 8900, 14900),
                product("haltane", "Haltane", 4800, 9400, 15900),
                product("pegasus", "Pegasus", 4200, 8400, 13900),
                product("herod", "Herod", 4200, 8400, 13900),
                product("delina", "Delina", 5200, 9900, 16900),
                product("sedley", "Sedley", 3900, 7900, 12900),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse() {
        assert_eq!("top".parse::<QualityTier>().unwrap(), QualityTier::Top);
        assert_eq!(" Premium ".parse::<QualityTier>().unwrap(), QualityTier::Premium);
        assert!("gold".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_quote() {
        let catalog = Catalog::default();
        let quote = catalog.quote(&ProductId::new("layton"), QualityTier::Top).unwrap();
        assert_eq!(quote.entry.name, "Layton");
        assert_eq!(quote.unit_price, Money::new(14900, Currency::USD));
    }

    #[test]
    fn test_quote_unknown_product() {
        let catalog = Catalog::default();
        let err = catalog.quote(&ProductId::new("nope"), QualityTier::Top).unwrap_err();
        assert!(matches!(err, CommerceError::ProductNotFound(_)));
    }

    #[test]
    fn test_quote_unpriced_tier() {
        let catalog = Catalog::new(
            Currency::USD,
            vec![CatalogEntry {
                product_id: ProductId::new("sample"),
                name: "Sample".to_string(),
                brand: "Test".to_string(),
                prices: BTreeMap::from([(QualityTier::Standard, 100)]),
            }],
        );
        let err = catalog.quote(&ProductId::new("sample"), QualityTier::Top).unwrap_err();
        assert!(matches!(err, CommerceError::TierNotPriced { .. }));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "currency": "EUR",
            "products": [
                {"product_id": "layton", "name": "Layton", "brand": "PdM", "prices": {"top": 20000}}
            ]
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let quote = catalog.quote(&ProductId::new("layton"), QualityTier::Top).unwrap();
        assert_eq!(quote.unit_price, Money::new(20000, Currency::EUR));
    }
}
