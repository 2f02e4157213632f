use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{deserialize_flag, deserialize_timestamp};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSummary {
    pub name: String,
    #[serde(default)]
    pub set_code: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryPoint {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub in_stock: bool,
}

/// A product with its price checks, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductHistory {
    pub product: ProductSummary,
    #[serde(default)]
    pub history: Vec<PriceHistoryPoint>,
}

impl ProductHistory {
    pub fn newest_first(&self) -> impl Iterator<Item = &PriceHistoryPoint> {
        self.history.iter().rev()
    }

    pub fn latest(&self) -> Option<&PriceHistoryPoint> {
        self.history.last()
    }
}
