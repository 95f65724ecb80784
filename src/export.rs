use serde::Serialize;

use crate::error::SourceError;
use crate::models::domain::{ObservationRecord, Timestamp};
use crate::source::RecordSource;
use crate::stats::Statistics;

/// Flat row handed to whoever writes CSV/JSON files.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub domain: String,
    pub ip: String,
    pub time: Timestamp,
    pub protocol: String,
    pub length: u64,
    pub request_count: u64,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub average_size: f64,
}

/// One row per record on the page, joined with its domain's statistics.
pub fn page_rows(page: &[ObservationRecord], stats: &Statistics) -> Vec<ExportRow> {
    page.iter()
        .filter_map(|record| {
            let domain = stats.domain(&record.domain)?;
            Some(ExportRow {
                domain: record.domain.clone(),
                ip: record.ip.clone(),
                time: record.time.clone(),
                protocol: record.protocol.clone(),
                length: record.length,
                request_count: domain.request_count,
                first_seen: domain.first_seen.clone(),
                last_seen: domain.last_seen.clone(),
                average_size: domain.average_size(),
            })
        })
        .collect()
}

/// Full history straight from the backend, ignoring every client-side filter.
pub async fn full_history<S: RecordSource>(source: &S) -> Result<Vec<u8>, SourceError> {
    source.export_all().await
}
