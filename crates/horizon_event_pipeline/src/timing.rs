//! Per-handler execution timings, collected by the dispatch loop.

use crate::handler::HandlerId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated timings of one handler registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Name the handler was registered under when it was first timed.
    pub handler: String,
    pub invocations: u64,
    pub total_execution_time_ns: u64,
    pub min_execution_time_ns: u64,
    pub max_execution_time_ns: u64,
}

impl TimingRecord {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        let elapsed_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.invocations += 1;
        self.total_execution_time_ns = self.total_execution_time_ns.saturating_add(elapsed_ns);
        if self.invocations == 1 || elapsed_ns < self.min_execution_time_ns {
            self.min_execution_time_ns = elapsed_ns;
        }
        if elapsed_ns > self.max_execution_time_ns {
            self.max_execution_time_ns = elapsed_ns;
        }
    }

    pub fn average_execution_time_ns(&self) -> u64 {
        if self.invocations == 0 {
            0
        } else {
            self.total_execution_time_ns / self.invocations
        }
    }
}

/// Concurrent map from handler registration to its [`TimingRecord`].
#[derive(Debug, Default)]
pub struct Timings {
    records: DashMap<HandlerId, TimingRecord>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one invocation, creating the record on first use.
    pub fn record(&self, id: HandlerId, handler: &str, elapsed: Duration) {
        self.records
            .entry(id)
            .or_insert_with(|| TimingRecord::new(handler))
            .record(elapsed);
    }

    pub fn get(&self, id: HandlerId) -> Option<TimingRecord> {
        self.records.get(&id).map(|record| record.clone())
    }

    /// Copies every record, e.g. for a metrics collector.
    pub fn snapshot(&self) -> Vec<(HandlerId, TimingRecord)> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn remove(&self, id: HandlerId) -> Option<TimingRecord> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn record_tracks_min_max_and_average() {
        let mut record = TimingRecord::new("physics");
        record.record(Duration::from_nanos(300));
        record.record(Duration::from_nanos(100));
        record.record(Duration::from_nanos(200));

        assert_eq!(record.invocations, 3);
        assert_eq!(record.min_execution_time_ns, 100);
        assert_eq!(record.max_execution_time_ns, 300);
        assert_eq!(record.total_execution_time_ns, 600);
        assert_eq!(record.average_execution_time_ns(), 200);
        assert_eq!(TimingRecord::default().average_execution_time_ns(), 0);
    }

    #[test]
    fn concurrent_records_are_all_counted() {
        let timings = Arc::new(Timings::new());
        let id = HandlerId::new();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let timings = Arc::clone(&timings);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        timings.record(id, "movement", Duration::from_micros(1));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let record = timings.get(id).unwrap();
        assert_eq!(record.invocations, 4_000);
        assert_eq!(record.handler, "movement");
        assert_eq!(timings.len(), 1);
    }

    #[test]
    fn snapshot_serializes() {
        let timings = Timings::new();
        timings.record(HandlerId::new(), "chat", Duration::from_nanos(42));
        let snapshot = timings.snapshot();
        let json = serde_json::to_value(&snapshot[0].1).unwrap();
        assert_eq!(json["handler"], "chat");
        assert_eq!(json["total_execution_time_ns"], 42);

        timings.clear();
        assert!(timings.is_empty());
    }
}
