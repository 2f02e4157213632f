use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{deserialize_flag, deserialize_timestamp};

pub type ProductId = i64;

/// One shop's listing of one catalogue item, as of its latest check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub set_code: Option<String>,
    #[serde(default)]
    pub site_slug: String,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub in_stock: bool,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Offer {
    /// Price that can take part in the best-price computation.
    pub fn buyable_price(&self) -> Option<Decimal> {
        if self.in_stock { self.price } else { None }
    }
}

/// Group as delivered by the grouped listing endpoint. Derived fields the
/// server may send are ignored; the aggregation engine recomputes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferGroupPayload {
    #[serde(default)]
    pub set_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}
