use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::models::domain::{ObservationRecord, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStat {
    pub domain: String,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub request_count: u64,
    pub data_transferred: u64,
    /// Most recent record for the domain.
    pub representative: ObservationRecord,
}

impl DomainStat {
    fn new(record: &ObservationRecord) -> Self {
        DomainStat {
            domain: record.domain.clone(),
            first_seen: record.time.clone(),
            last_seen: record.time.clone(),
            request_count: 1,
            data_transferred: record.length,
            representative: record.clone(),
        }
    }

    fn absorb(&mut self, record: &ObservationRecord) {
        self.request_count += 1;
        self.data_transferred = self.data_transferred.saturating_add(record.length);
        if record.time < self.first_seen {
            self.first_seen = record.time.clone();
        }
        if record.time > self.last_seen {
            self.last_seen = record.time.clone();
            self.representative = record.clone();
        }
    }

    pub fn average_size(&self) -> f64 {
        self.data_transferred as f64 / self.request_count.max(1) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStat {
    pub ip: String,
    pub request_count: u64,
    pub bytes: u64,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub protocols: BTreeMap<String, u64>,
    pub domains: BTreeSet<String>,
}

impl DeviceStat {
    fn new(record: &ObservationRecord) -> Self {
        let mut stat = DeviceStat {
            ip: record.ip.clone(),
            request_count: 0,
            bytes: 0,
            first_seen: record.time.clone(),
            last_seen: record.time.clone(),
            protocols: BTreeMap::new(),
            domains: BTreeSet::new(),
        };
        stat.absorb(record);
        stat
    }

    fn absorb(&mut self, record: &ObservationRecord) {
        self.request_count += 1;
        self.bytes = self.bytes.saturating_add(record.length);
        if record.time < self.first_seen {
            self.first_seen = record.time.clone();
        }
        if record.time > self.last_seen {
            self.last_seen = record.time.clone();
        }
        *self.protocols.entry(record.protocol.clone()).or_insert(0) += 1;
        if !self.domains.contains(&record.domain) {
            self.domains.insert(record.domain.clone());
        }
    }
}

/// Aggregates of one working subset. Domains and devices are kept in the
/// order they were first met, which is the tie-break order for ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    domains: Vec<DomainStat>,
    devices: Vec<DeviceStat>,
    pub total_requests: u64,
    pub total_bytes: u64,
    #[serde(skip)]
    domain_index: HashMap<String, usize>,
    #[serde(skip)]
    device_index: HashMap<String, usize>,
}

impl Statistics {
    /// Single pass over the subset.
    pub fn aggregate<'r>(records: impl IntoIterator<Item = &'r ObservationRecord>) -> Self {
        let mut stats = Statistics::default();
        for record in records {
            stats.total_requests += 1;
            stats.total_bytes = stats.total_bytes.saturating_add(record.length);

            match stats.domain_index.get(&record.domain) {
                Some(&i) => stats.domains[i].absorb(record),
                None => {
                    stats.domain_index.insert(record.domain.clone(), stats.domains.len());
                    stats.domains.push(DomainStat::new(record));
                }
            }

            match stats.device_index.get(&record.ip) {
                Some(&i) => stats.devices[i].absorb(record),
                None => {
                    stats.device_index.insert(record.ip.clone(), stats.devices.len());
                    stats.devices.push(DeviceStat::new(record));
                }
            }
        }
        stats
    }

    pub fn domains(&self) -> &[DomainStat] {
        &self.domains
    }

    pub fn devices(&self) -> &[DeviceStat] {
        &self.devices
    }

    pub fn domain(&self, name: &str) -> Option<&DomainStat> {
        self.domain_index.get(name).map(|&i| &self.domains[i])
    }

    pub fn device(&self, ip: &str) -> Option<&DeviceStat> {
        self.device_index.get(ip).map(|&i| &self.devices[i])
    }

    pub fn unique_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_requests == 0
    }
}
