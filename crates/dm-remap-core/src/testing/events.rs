//! Counting `tracing` subscriber.
//!
//! Used to check that a code path emits no log events, such as the
//! mapping path.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Metadata, Subscriber};

/// Subscriber that enables everything and counts events.
struct EventCounter {
    events: Arc<AtomicUsize>,
    next_span: AtomicU64,
}

impl Subscriber for EventCounter {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(self.next_span.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, _event: &Event<'_>) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Run `f` with a counting subscriber as this thread's default, at every
/// level, and return its result with the number of events it emitted.
pub fn count_events<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let events = Arc::new(AtomicUsize::new(0));
    let subscriber = EventCounter {
        events: Arc::clone(&events),
        next_span: AtomicU64::new(1),
    };
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, events.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_events_at_every_level() {
        let ((), events) = count_events(|| {
            tracing::trace!("one");
            tracing::debug!(value = 2, "two");
            tracing::warn!("three");
        });
        assert_eq!(events, 3);
    }
}
