use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub const UNKNOWN_PRICE: &str = "unknown";

/// Offer price; an absent price is "unknown", never zero.
pub fn format_price(price: Option<Decimal>) -> String {
    match price {
        Some(price) => format!("{:.2} €", price.round_dp(2)),
        None => UNKNOWN_PRICE.to_string(),
    }
}

/// Dashboard and history cells use a dash for missing values.
pub fn format_price_or_dash(price: Option<Decimal>) -> String {
    match price {
        Some(price) => format!("{:.2} €", price.round_dp(2)),
        None => "-".to_string(),
    }
}

pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(at).num_seconds();
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3_600 {
        format!("{} min", seconds / 60)
    } else if seconds < 86_400 {
        format!("{} h", seconds / 3_600)
    } else {
        at.format("%-d %b").to_string()
    }
}

pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%y %H:%M").to_string()
}

pub fn results_summary(count: usize) -> String {
    match count {
        0 => String::new(),
        1 => "1 product found".to_string(),
        n => format!("{} products found", n),
    }
}
