pub mod aggregator;
pub mod query;
pub mod scan;
pub mod timers;

pub use aggregator::{group_offers, normalize_groups, OfferGroup};
pub use query::{FilterState, QueryDescriptor, SortKey, StockFilter};
pub use scan::{PollFailurePolicy, ScanEffect, ScanMachine, ScanNotice, ScanState};
pub use timers::{Debouncer, PollTimer};
