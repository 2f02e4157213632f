use std::io::Write;

use chrono::Utc;

use crate::engine::aggregator::offer_count;
use crate::engine::OfferGroup;
use crate::models::{AggregateStats, ProductHistory, Site};
use crate::ui::format::{
    format_datetime, format_price, format_price_or_dash, format_relative, results_summary,
};
use crate::ui::{Notification, NotificationLevel, Theme, View};

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Bad,
    Highlight,
    Muted,
}

/// Line-oriented view for a terminal (or any writer).
pub struct TerminalView<W: Write + Send> {
    out: W,
    theme: Theme,
    color: bool,
    scan_enabled: Option<bool>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, theme: Theme, color: bool) -> Self {
        Self {
            out,
            theme,
            color,
            scan_enabled: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: impl AsRef<str>) {
        if let Err(e) = writeln!(self.out, "{}", line.as_ref()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        // Dark backgrounds get the bright palette.
        let code = match (tone, self.theme) {
            (Tone::Good, Theme::Light) => "32",
            (Tone::Good, Theme::Dark) => "92",
            (Tone::Bad, Theme::Light) => "31",
            (Tone::Bad, Theme::Dark) => "91",
            (Tone::Highlight, Theme::Light) => "33;1",
            (Tone::Highlight, Theme::Dark) => "93;1",
            (Tone::Muted, _) => "2",
        };
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }

    fn stock_badge(&self, in_stock: bool) -> String {
        if in_stock {
            self.paint("● in stock", Tone::Good)
        } else {
            self.paint("● out of stock", Tone::Bad)
        }
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn render_groups(&mut self, groups: &[OfferGroup]) {
        if groups.is_empty() {
            self.emit("No products. Run `scan` to start monitoring the sites.");
            return;
        }

        let now = Utc::now();
        let summary = results_summary(offer_count(groups));
        self.emit(self.paint(&summary, Tone::Muted));

        for group in groups {
            let set = group
                .set_code()
                .map(|code| format!("[{}] ", code))
                .unwrap_or_default();
            let header = format!(
                "{}{}  best {}  {}",
                set,
                group.name(),
                format_price(group.best_price()),
                self.stock_badge(group.any_in_stock())
            );
            self.emit(header);

            for offer in group.offers() {
                let marker = if group.is_best(offer) {
                    self.paint("★", Tone::Highlight)
                } else {
                    " ".to_string()
                };
                let seen = offer
                    .checked_at
                    .map(|at| format_relative(at, now))
                    .unwrap_or_default();
                let line = format!(
                    "  {} {:<18} {:>12}  {}  {}  #{} {}",
                    marker,
                    offer.site_name,
                    format_price(offer.price),
                    self.stock_badge(offer.in_stock),
                    self.paint(&seen, Tone::Muted),
                    offer.id,
                    offer.url
                );
                self.emit(line);
            }
        }
    }

    fn render_stats(&mut self, stats: &AggregateStats) {
        let mut line = format!(
            "Products: {} | In stock: {} | Out of stock: {} | Sites: {} | Avg: {} | Best: {}",
            stats.total_products,
            stats.in_stock,
            stats.out_of_stock,
            stats.total_sites,
            format_price_or_dash(stats.avg_price),
            format_price_or_dash(stats.best_price),
        );
        if let Some(finished) = stats.last_scan_finished_at() {
            line.push_str(&format!(" | Last scan: {}", format_relative(finished, Utc::now())));
        }
        self.emit(line);
    }

    fn render_sites(&mut self, sites: &[Site]) {
        let names: Vec<String> = sites
            .iter()
            .map(|site| format!("{} ({})", site.name, site.slug))
            .collect();
        self.emit(format!("Sites: {}", names.join(", ")));
    }

    fn render_sets(&mut self, sets: &[String]) {
        self.emit(format!("Sets: {}", sets.join(", ")));
    }

    fn render_history(&mut self, history: &ProductHistory) {
        let product = &history.product;
        self.emit(self.paint(&product.name, Tone::Highlight));
        self.emit(format!(
            "{} / {}",
            product.set_code.as_deref().unwrap_or(""),
            product.site_name.as_deref().unwrap_or("")
        ));

        if history.history.is_empty() {
            self.emit("No price history available.");
            return;
        }

        self.emit(format!("{:<16} {:>12}  {}", "Date", "Price", "Stock"));
        let rows: Vec<String> = history
            .newest_first()
            .map(|point| {
                format!(
                    "{:<16} {:>12}  {}",
                    point.checked_at.map(format_datetime).unwrap_or_default(),
                    format_price_or_dash(point.price),
                    self.stock_badge(point.in_stock)
                )
            })
            .collect();
        for row in rows {
            self.emit(row);
        }
    }

    fn set_scan_enabled(&mut self, enabled: bool) {
        if self.scan_enabled == Some(enabled) {
            return;
        }
        self.scan_enabled = Some(enabled);
        if enabled {
            self.emit(self.paint("[scan] ready", Tone::Muted));
        } else {
            self.emit(self.paint("[scan] running...", Tone::Muted));
        }
    }

    fn notify(&mut self, notification: &Notification) {
        let line = match notification.level {
            NotificationLevel::Info => format!("[info] {}", notification.message),
            NotificationLevel::Success => {
                self.paint(&format!("[ok] {}", notification.message), Tone::Good)
            }
            NotificationLevel::Warning => {
                self.paint(&format!("[warn] {}", notification.message), Tone::Highlight)
            }
            NotificationLevel::Error => {
                self.paint(&format!("[error] {}", notification.message), Tone::Bad)
            }
        };
        self.emit(line);
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }
}
