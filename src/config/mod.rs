//! Crawl configuration: the immutable [`CrawlJob`] and its builder.

pub mod builder;
pub mod types;

pub use builder::CrawlJobBuilder;
pub use types::CrawlJob;
