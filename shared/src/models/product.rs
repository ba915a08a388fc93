//! Product catalogue and vendor pricing tiers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ParseEnumError;

/// Commercial channel of a vendor, which decides the price it pays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum VendorType {
    /// Wholesaler
    Gros,
    /// Retail shop
    #[default]
    Detail,
    /// Small supermarket
    Superette,
}

/// Which of a product's price columns applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Factory,
    Wholesale,
    Retail,
    Supermarket,
}

impl VendorType {
    pub const ALL: [VendorType; 3] = [VendorType::Gros, VendorType::Detail, VendorType::Superette];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Gros => "gros",
            VendorType::Detail => "detail",
            VendorType::Superette => "superette",
        }
    }

    pub fn price_tier(&self) -> PriceTier {
        match self {
            VendorType::Gros => PriceTier::Wholesale,
            VendorType::Superette => PriceTier::Supermarket,
            VendorType::Detail => PriceTier::Retail,
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VendorType::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("vendor type", s))
    }
}

impl TryFrom<String> for VendorType {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The four price columns carried by every product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProductPrices {
    pub factory: Decimal,
    pub wholesale: Decimal,
    pub retail: Decimal,
    pub supermarket: Decimal,
}

impl ProductPrices {
    pub fn for_tier(&self, tier: PriceTier) -> Decimal {
        match tier {
            PriceTier::Factory => self.factory,
            PriceTier::Wholesale => self.wholesale,
            PriceTier::Retail => self.retail,
            PriceTier::Supermarket => self.supermarket,
        }
    }

    /// Unit price a vendor of the given type pays
    pub fn for_vendor(&self, vendor_type: VendorType) -> Decimal {
        self.for_tier(vendor_type.price_tier())
    }
}

/// Sum `unit_price * quantity` over priced lines
pub fn line_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| price * Decimal::from(qty))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices() -> ProductPrices {
        ProductPrices {
            factory: Decimal::new(8000, 2),
            wholesale: Decimal::new(9000, 2),
            retail: Decimal::new(11000, 2),
            supermarket: Decimal::new(10000, 2),
        }
    }

    #[test]
    fn test_price_for_vendor_type() {
        let p = prices();
        assert_eq!(p.for_vendor(VendorType::Gros), p.wholesale);
        assert_eq!(p.for_vendor(VendorType::Superette), p.supermarket);
        assert_eq!(p.for_vendor(VendorType::Detail), p.retail);
    }

    #[test]
    fn test_default_vendor_type_is_detail() {
        assert_eq!(VendorType::default(), VendorType::Detail);
    }

    #[test]
    fn test_unknown_vendor_type_rejected() {
        assert!("export".parse::<VendorType>().is_err());
        assert_eq!("gros".parse::<VendorType>().unwrap(), VendorType::Gros);
    }

    #[test]
    fn test_line_total() {
        let total = line_total([(Decimal::new(250, 2), 4), (Decimal::from(10), 3)]);
        assert_eq!(total, Decimal::from(40));
        assert_eq!(line_total(std::iter::empty()), Decimal::ZERO);
    }
}
