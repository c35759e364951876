use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub status: ProductStatus,
    /// Raw discount configuration JSON as stored; parse with
    /// [`DiscountTable::parse`] before use.
    pub discount_config: String,
    pub created_at: i64,
}

/// A purchasable tier of a product. `base_price` is per month;
/// `max_seats` of 0 means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub base_price: i64,
    pub max_seats: i32,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub discount_config: Option<DiscountTable>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePackage {
    pub product_id: String,
    pub name: String,
    pub base_price: i64,
    #[serde(default)]
    pub max_seats: i32,
}

/// Per-product discount percentages keyed by duration tier. The key names
/// (`month3`/`month6`/`year1`) are the stored data format; 1-month
/// purchases and any tier absent from the config get 0%.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiscountTable {
    #[serde(default)]
    pub month3: u8,
    #[serde(default)]
    pub month6: u8,
    #[serde(default)]
    pub year1: u8,
}

impl DiscountTable {
    /// Parse and validate a stored discount config. Malformed configuration
    /// is an error, never silently coerced; missing tiers default to 0%.
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let table: Self = serde_json::from_str(json)
            .map_err(|e| AppError::Internal(format!("malformed discount config: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        for (tier, pct) in [
            ("month3", self.month3),
            ("month6", self.month6),
            ("year1", self.year1),
        ] {
            if pct > 100 {
                return Err(AppError::Internal(format!(
                    "discount config: {tier} is {pct}%, must be 0-100"
                )));
            }
        }
        Ok(())
    }

    /// Discount percent for a purchase duration. Unknown tiers fall back
    /// to 0%.
    pub fn percent_for(&self, months: i64) -> u8 {
        match months {
            3 => self.month3,
            6 => self.month6,
            12 => self.year1,
            _ => 0,
        }
    }
}
