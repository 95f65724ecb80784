use std::collections::HashSet;

use serde::Serialize;

use crate::stats::{DomainStat, Statistics};

pub const DEFAULT_TOP_N: usize = 10;

/// Domains by request count, highest first. The sort is stable so equal
/// counts keep first-appearance order.
pub fn rank_domains(stats: &Statistics) -> Vec<&DomainStat> {
    let mut ranked: Vec<&DomainStat> = stats.domains().iter().collect();
    ranked.sort_by(|a, b| b.request_count.cmp(&a.request_count));
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub domain: String,
    pub request_count: u64,
    pub data_transferred: u64,
    /// Percent of the top-N request total, rounded half up.
    pub share: u32,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopDomains {
    pub entries: Vec<TopEntry>,
    pub total_requests: u64,
    pub total_bytes: u64,
    /// Distinct devices among the entries' representative records.
    pub unique_devices: usize,
    pub average_request_size: f64,
}

impl TopDomains {
    pub fn from_stats(stats: &Statistics, n: usize) -> Self {
        let top: Vec<&DomainStat> = rank_domains(stats).into_iter().take(n).collect();

        let total_requests: u64 = top.iter().map(|s| s.request_count).sum();
        // lengths are saturated on the wire, so byte totals saturate too
        let total_bytes = top
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.data_transferred));
        let unique_devices = top
            .iter()
            .map(|s| s.representative.ip.as_str())
            .collect::<HashSet<_>>()
            .len();

        let entries = top
            .iter()
            .map(|s| TopEntry {
                domain: s.domain.clone(),
                request_count: s.request_count,
                data_transferred: s.data_transferred,
                share: percent_share(s.request_count, total_requests),
                ip: s.representative.ip.clone(),
            })
            .collect();

        TopDomains {
            entries,
            total_requests,
            total_bytes,
            unique_devices,
            average_request_size: average(total_bytes, total_requests),
        }
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.domain.as_str())
    }
}

/// `round(100 * part / total)` with halves rounded up, 0 when total is 0.
pub fn percent_share(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * part + total) / (2 * total)) as u32
}

pub fn average(bytes: u64, requests: u64) -> f64 {
    bytes as f64 / requests.max(1) as f64
}
