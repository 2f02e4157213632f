use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::deserialize_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastScan {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Dashboard totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateStats {
    #[serde(default)]
    pub total_products: u64,
    #[serde(default)]
    pub in_stock: u64,
    #[serde(default)]
    pub out_of_stock: u64,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub total_sites: u64,
    #[serde(default)]
    pub best_price: Option<Decimal>,
    #[serde(default)]
    pub last_scan: Option<LastScan>,
}

impl AggregateStats {
    pub fn last_scan_finished_at(&self) -> Option<DateTime<Utc>> {
        self.last_scan.as_ref().and_then(|scan| scan.finished_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}
