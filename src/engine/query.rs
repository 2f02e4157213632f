//! Turns the raw filter controls into the query string the backend expects.
//!
//! Only criteria carrying a real value are emitted: empty strings and the
//! `any` sentinel are dropped instead of being sent as empty parameters.

use serde::{Deserialize, Serialize};

/// Sentinel a control can hold to mean "no restriction".
pub const ANY: &str = "any";

/// Raw values of the five filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub site: String,
    pub set: String,
    pub stock: String,
    pub sort: String,
    pub search: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockFilter {
    Any,
    InStock,
    OutOfStock,
}

impl StockFilter {
    pub fn as_param(&self) -> &'static str {
        match self {
            StockFilter::Any => "",
            StockFilter::InStock => "1",
            StockFilter::OutOfStock => "0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    Name,
    Recent,
}

impl SortKey {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortKey::PriceAsc => "price_asc",
            SortKey::PriceDesc => "price_desc",
            SortKey::Name => "name",
            SortKey::Recent => "recent",
        }
    }
}

/// Canonical set of criteria to send with a listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub site: Option<String>,
    pub set: Option<String>,
    pub in_stock: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl QueryDescriptor {
    pub fn from_filter(filter: &FilterState) -> Self {
        Self {
            site: criterion(&filter.site),
            set: criterion(&filter.set),
            in_stock: criterion(&filter.stock),
            sort: criterion(&filter.sort),
            search: criterion(&filter.search),
        }
    }

    /// The grouped listing only understands set, stock and search.
    pub fn for_groups(&self) -> Self {
        Self {
            site: None,
            sort: None,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Query-string pairs in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("site", &self.site),
            ("set", &self.set),
            ("in_stock", &self.in_stock),
            ("sort", &self.sort),
            ("search", &self.search),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone())))
        .collect()
    }
}

fn criterion(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(ANY) {
        None
    } else {
        Some(raw.to_string())
    }
}
