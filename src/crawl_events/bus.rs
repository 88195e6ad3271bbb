//! Broadcast bus for crawl progress events.
//!
//! The bus is strictly push-only from the engine's perspective: `publish`
//! never suspends and never applies backpressure, so a slow or absent
//! subscriber cannot stall crawling. Events that find no subscriber are
//! counted and dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::types::CrawlEvent;

/// Counters for bus activity. Individual reads are atomic; use
/// [`BusMetrics::snapshot`] for a consistent view across counters.
#[derive(Debug, Default)]
pub struct BusMetrics {
    events_published: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_dropped: u64,
}

impl BusMetrics {
    fn record_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Event bus for publishing and subscribing to [`CrawlEvent`]s.
#[derive(Debug)]
pub struct CrawlEventBus {
    sender: broadcast::Sender<CrawlEvent>,
    metrics: BusMetrics,
}

impl CrawlEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    /// Subscribers that fall more than `capacity` events behind lose the
    /// oldest events, never the publisher's time.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            metrics: BusMetrics::default(),
        }
    }

    /// Subscribe to all subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event to all current subscribers, returning how many
    /// received it. With no subscribers the event is dropped and counted;
    /// this is not an error the engine reacts to.
    pub fn publish(&self, event: CrawlEvent) -> usize {
        match self.sender.send(event) {
            Ok(subscriber_count) => {
                self.metrics.record_published();
                subscriber_count
            }
            Err(_) => {
                self.metrics.record_dropped();
                0
            }
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }
}

impl Default for CrawlEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
