// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Event Sinks
// ─────────────────────────────────────────────────────────────────────
//! Where per-tick event records go. Writing to files is the caller's
//! business; the engine only hands records to a sink.

use parking_lot::Mutex;

use homeostat_types::EventRecord;

pub trait EventSink: Send + Sync {
    fn record(&self, event: &EventRecord);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &EventRecord) {}
}

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Copy of all records so far.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    /// Take all records, leaving the sink empty.
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &EventRecord) {
        self.events.lock().push(event.clone());
    }
}
