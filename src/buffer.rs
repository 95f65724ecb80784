use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::models::domain::ObservationRecord;

pub const MAX_RECORDS: usize = 1000;
pub const NEAR_CAPACITY_THRESHOLD: usize = 800;

/// Bounded log of observation records, newest first.
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    records: VecDeque<ObservationRecord>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BufferUsage {
    pub len: usize,
    pub capacity: usize,
    pub usage_percent: f64,
    pub near_capacity: bool,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RECORDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RecordBuffer {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replaces the whole buffer with a snapshot. The batch is sorted newest
    /// first (stable, so equal times keep the source's order) and only the
    /// newest `capacity` records are kept.
    pub fn replace_all(&mut self, mut batch: Vec<ObservationRecord>) {
        batch.sort_by(|a, b| b.time.cmp(&a.time));
        if batch.len() > self.capacity {
            debug!(
                dropped = batch.len() - self.capacity,
                "snapshot larger than buffer, dropping oldest"
            );
            batch.truncate(self.capacity);
        }
        self.records = batch.into();
    }

    /// Inserts at the newest position. Returns the evicted tail record, if any.
    pub fn append(&mut self, record: ObservationRecord) -> Option<ObservationRecord> {
        self.records.push_front(record);
        if self.records.len() > self.capacity {
            let evicted = self.records.pop_back();
            if let Some(old) = &evicted {
                debug!(domain = %old.domain, time = %old.time, "evicted oldest record");
            }
            return evicted;
        }
        None
    }

    /// Drops every record observed before `cutoff`. Relative order is kept.
    pub fn prune_before(&mut self, cutoff: NaiveDateTime) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.time.instant() >= cutoff);
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn usage(&self, warn_at: usize) -> BufferUsage {
        BufferUsage {
            len: self.records.len(),
            capacity: self.capacity,
            usage_percent: self.records.len() as f64 * 100.0 / self.capacity as f64,
            near_capacity: self.records.len() >= warn_at,
        }
    }
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(domain: &str, secs: u32) -> ObservationRecord {
        let time = format!("2024-03-01 12:{:02}:{:02}", secs / 60, secs % 60);
        ObservationRecord::new(domain, "10.0.0.1", &time, "UDP", 60).unwrap()
    }

    fn is_newest_first(buffer: &RecordBuffer) -> bool {
        let times: Vec<_> = buffer.iter().map(|r| r.time.clone()).collect();
        times.windows(2).all(|w| w[0] >= w[1])
    }

    #[test]
    fn append_never_exceeds_capacity() {
        let mut buffer = RecordBuffer::with_capacity(5);
        for secs in 0..12 {
            buffer.append(record("a.com", secs));
            assert!(buffer.len() <= 5);
            assert!(is_newest_first(&buffer));
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.iter().next().unwrap().time.as_str(), "2024-03-01 12:00:11");
    }

    #[test]
    fn append_evicts_exactly_the_tail() {
        let mut buffer = RecordBuffer::with_capacity(2);
        assert!(buffer.append(record("a.com", 1)).is_none());
        assert!(buffer.append(record("b.com", 2)).is_none());
        let evicted = buffer.append(record("c.com", 3)).unwrap();
        assert_eq!(evicted.domain, "a.com");
        let domains: Vec<_> = buffer.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["c.com", "b.com"]);
    }

    #[test]
    fn replace_all_sorts_and_keeps_newest() {
        let mut buffer = RecordBuffer::with_capacity(3);
        buffer.replace_all(vec![
            record("old.com", 1),
            record("new.com", 9),
            record("mid.com", 5),
            record("older.com", 0),
        ]);
        let domains: Vec<_> = buffer.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["new.com", "mid.com", "old.com"]);
    }

    #[test]
    fn replace_all_is_idempotent() {
        let batch = vec![record("a.com", 3), record("b.com", 3), record("c.com", 1)];
        let mut buffer = RecordBuffer::new();
        buffer.replace_all(batch.clone());
        let first: Vec<_> = buffer.iter().cloned().collect();
        buffer.replace_all(batch);
        let second: Vec<_> = buffer.iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn prune_keeps_recent_records_in_order() {
        let mut buffer = RecordBuffer::new();
        buffer.replace_all(vec![record("a.com", 10), record("b.com", 20), record("c.com", 30)]);
        let cutoff = record("x", 15).time.instant();
        assert_eq!(buffer.prune_before(cutoff), 1);
        let domains: Vec<_> = buffer.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["c.com", "b.com"]);
    }

    #[test]
    fn usage_reports_threshold() {
        let mut buffer = RecordBuffer::with_capacity(10);
        for secs in 0..8 {
            buffer.append(record("a.com", secs));
        }
        let usage = buffer.usage(8);
        assert_eq!(usage.len, 8);
        assert!(usage.near_capacity);
        assert!((usage.usage_percent - 80.0).abs() < f64::EPSILON);
    }
}
