//! Crawl progress events and the bus that carries them.

pub mod bus;
pub mod types;

pub use bus::{BusMetrics, CrawlEventBus, MetricsSnapshot};
pub use types::CrawlEvent;
