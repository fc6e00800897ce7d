//! Display log of realtime events with run-length merging.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::realtime::RealtimeEventRecord;

/// One display row.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry {
    /// First event of the run.
    pub record: RealtimeEventRecord,
    /// Consecutive events of this type, including the first.
    pub count: u32,
    /// Time since the session clock started.
    pub elapsed: Duration,
}

impl EventEntry {
    pub fn event_type(&self) -> &str {
        self.record.event_type()
    }
}

/// Ordered event log. A new event whose type matches the last entry bumps
/// that entry's count instead of adding a row.
#[derive(Debug, Default)]
pub struct EventLog {
    started_at: Option<DateTime<Utc>>,
    entries: Vec<EventEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear and restart the session clock.
    pub fn start(&mut self) {
        self.entries.clear();
        self.started_at = Some(Utc::now());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.started_at = None;
    }

    pub fn record(&mut self, record: RealtimeEventRecord) {
        if let Some(last) = self.entries.last_mut() {
            if last.event_type() == record.event_type() {
                last.count += 1;
                return;
            }
        }
        let elapsed = self
            .started_at
            .and_then(|start| (record.time - start).to_std().ok())
            .unwrap_or_default();
        self.entries.push(EventEntry {
            record,
            count: 1,
            elapsed,
        });
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

/// `mm:ss.cc`
pub fn format_elapsed(elapsed: Duration) -> String {
    let centis = elapsed.as_millis() / 10;
    format!(
        "{:02}:{:02}.{:02}",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::EventSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(event_type: &str) -> RealtimeEventRecord {
        RealtimeEventRecord::new(EventSource::Server, json!({ "type": event_type }))
    }

    #[test]
    fn consecutive_types_merge() {
        let mut log = EventLog::new();
        log.start();
        for event_type in ["t1", "t1", "t2", "t1"] {
            log.record(record(event_type));
        }
        let rows: Vec<_> = log
            .entries()
            .iter()
            .map(|entry| (entry.event_type().to_string(), entry.count))
            .collect();
        assert_eq!(
            rows,
            vec![("t1".to_string(), 2), ("t2".to_string(), 1), ("t1".to_string(), 1)]
        );
    }

    #[test]
    fn merging_ignores_source() {
        let mut log = EventLog::new();
        log.record(RealtimeEventRecord::new(EventSource::Client, json!({ "type": "a" })));
        log.record(RealtimeEventRecord::new(EventSource::Server, json!({ "type": "a" })));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].record.source, EventSource::Client);
    }

    #[test]
    fn clear_drops_entries_and_clock() {
        let mut log = EventLog::new();
        log.start();
        log.record(record("a"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.started_at().is_none());
    }

    #[test]
    fn formats_minutes_seconds_centis() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00.00");
        assert_eq!(format_elapsed(Duration::from_millis(65_432)), "01:05.43");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00.00");
    }
}
