use crate::app::{Criterion, UserAction};
use crate::engine::{SortKey, StockFilter};

pub const HELP: &str = "commands: scan | search <text> | site <slug> | set <code> | \
stock <in|out|any> | sort <price_asc|price_desc|name|recent> | clear | history <id> | \
theme | refresh | quit";

/// Parses one line typed in watch mode.
pub fn parse_command(line: &str) -> Option<UserAction> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "scan" => Some(UserAction::TriggerScan),
        "search" | "/" => Some(UserAction::SearchInput(rest.to_string())),
        "site" => Some(UserAction::SetCriterion(Criterion::Site, rest.to_string())),
        "set" => Some(UserAction::SetCriterion(Criterion::Set, rest.to_string())),
        "stock" => parse_stock(rest)
            .map(|stock| UserAction::SetCriterion(Criterion::Stock, stock.as_param().to_string())),
        "sort" => parse_sort(rest)
            .map(|sort| UserAction::SetCriterion(Criterion::Sort, sort.to_string())),
        "clear" => Some(UserAction::ClearFilters),
        "history" => rest.parse().ok().map(UserAction::ShowHistory),
        "theme" => Some(UserAction::ToggleTheme),
        "refresh" => Some(UserAction::Refresh),
        "quit" | "exit" | "q" => Some(UserAction::Quit),
        _ => None,
    }
}

pub fn parse_stock(raw: &str) -> Option<StockFilter> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "any" | "all" => Some(StockFilter::Any),
        "in" | "1" | "yes" => Some(StockFilter::InStock),
        "out" | "0" | "no" => Some(StockFilter::OutOfStock),
        _ => None,
    }
}

/// Sort keys as the backend names them; empty clears the sort.
fn parse_sort(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "any" => Some(""),
        "price_asc" | "price" => Some(SortKey::PriceAsc.as_param()),
        "price_desc" => Some(SortKey::PriceDesc.as_param()),
        "name" => Some(SortKey::Name.as_param()),
        "recent" => Some(SortKey::Recent.as_param()),
        _ => None,
    }
}
