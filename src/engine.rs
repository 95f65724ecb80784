//! The dashboard engine: one owned instance holding the record buffer and the
//! filter state, with every statistic derived from them on demand.
//!
//! Derived data lives in a single memoized [`DashboardView`]. Any operation
//! that changes an input drops it, and the next [`DashboardEngine::view`]
//! rebuilds it from scratch, so nothing is ever patched in place.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::{BufferUsage, RecordBuffer};
use crate::color::Colorizer;
use crate::config::Config;
use crate::error::{ConfigError, EngineError, Result};
use crate::export::{page_rows, ExportRow};
use crate::filter::{Filter, Selection};
use crate::models::domain::ObservationRecord;
use crate::models::dto::RecordDTO;
use crate::paginate::Paginator;
use crate::rank::{rank_domains, TopDomains};
use crate::stats::{DomainStat, Statistics};

/// Sequence number of an issued bulk refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(IngestReport),
    /// A newer snapshot was already applied; this one was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub number: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub window: Vec<usize>,
    pub rows: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub usage: BufferUsage,
    /// Records left after selection and drill-down.
    pub subset_len: usize,
    pub stats: Statistics,
    pub ranked: Vec<DomainStat>,
    pub top: TopDomains,
    pub page: PageView,
    pub device_colors: BTreeMap<String, String>,
    pub drill_down: Option<String>,
    pub show_all: bool,
    pub selection: Selection,
}

impl DashboardView {
    /// Nothing to show. Presentation renders a "no data" state for this.
    pub fn is_empty(&self) -> bool {
        self.subset_len == 0
    }
}

pub struct DashboardEngine {
    buffer: RecordBuffer,
    selection: Selection,
    drill_down: Option<String>,
    show_all: bool,
    pages: Paginator,
    top_n: usize,
    near_capacity: usize,
    colorizer: Colorizer,
    issued: u64,
    applied: u64,
    view: Option<DashboardView>,
}

impl DashboardEngine {
    pub fn new(config: &Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(DashboardEngine {
            buffer: RecordBuffer::with_capacity(config.capacity),
            selection: Selection::new(),
            drill_down: None,
            show_all: false,
            pages: Paginator::new(config.page_size),
            top_n: config.top_n,
            near_capacity: config.near_capacity,
            colorizer: Colorizer::new(config.palette.clone())?,
            issued: 0,
            applied: 0,
            view: None,
        })
    }

    fn invalidate(&mut self) {
        self.view = None;
    }

    fn warn_if_near_capacity(&self) {
        let usage = self.buffer.usage(self.near_capacity);
        if usage.near_capacity {
            warn!(len = usage.len, capacity = usage.capacity, "record buffer nearly full");
        }
    }

    // ingestion

    /// Replaces the buffer with a snapshot. Malformed records are dropped and
    /// counted; the rest replace the previous contents wholesale.
    pub fn replace_all(&mut self, batch: Vec<RecordDTO>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut records = Vec::with_capacity(batch.len());
        for dto in batch {
            match ObservationRecord::try_from(dto) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(error = %e, "dropping record from snapshot");
                    report.rejected += 1;
                }
            }
        }
        report.accepted = records.len();
        if report.rejected > 0 {
            warn!(rejected = report.rejected, "snapshot contained invalid records");
        }

        self.selection
            .register(records.iter().map(|r| r.domain.as_str()));
        self.buffer.replace_all(records);
        self.warn_if_near_capacity();
        self.invalidate();
        report
    }

    /// Pushed record. Rejected without touching the buffer when malformed.
    pub fn append(&mut self, dto: RecordDTO) -> Result<()> {
        let record = ObservationRecord::try_from(dto).map_err(|e| {
            warn!(error = %e, "dropping pushed record");
            EngineError::InvalidRecord(e)
        })?;
        self.append_record(record);
        Ok(())
    }

    pub fn append_record(&mut self, record: ObservationRecord) {
        self.selection.register([record.domain.as_str()]);
        self.buffer.append(record);
        if self.buffer.len() == self.near_capacity {
            self.warn_if_near_capacity();
        }
        self.invalidate();
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Applies a refresh response unless a later one already landed.
    pub fn complete_refresh(&mut self, ticket: RefreshTicket, batch: Vec<RecordDTO>) -> RefreshOutcome {
        if ticket.0 <= self.applied {
            debug!(ticket = ticket.0, applied = self.applied, "discarding stale refresh");
            return RefreshOutcome::Stale;
        }
        self.applied = ticket.0;
        RefreshOutcome::Applied(self.replace_all(batch))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        info!("record buffer cleared");
        self.invalidate();
    }

    pub fn prune_before(&mut self, cutoff: NaiveDateTime) -> usize {
        let removed = self.buffer.prune_before(cutoff);
        if removed > 0 {
            info!(removed, %cutoff, "pruned old records");
            self.invalidate();
        }
        removed
    }

    // selection and drill-down

    pub fn toggle_domain(&mut self, domain: &str) -> bool {
        self.invalidate();
        self.selection.toggle(domain)
    }

    pub fn set_domain(&mut self, domain: &str, selected: bool) {
        self.selection.set(domain, selected);
        self.invalidate();
    }

    pub fn toggle_all_domains(&mut self) {
        self.selection.toggle_all();
        self.invalidate();
    }

    /// Commits the working selection. Lifts the show-everything override.
    pub fn save_selection(&mut self) -> bool {
        let changed = self.selection.save();
        self.show_all = false;
        self.pages.first();
        self.invalidate();
        changed
    }

    pub fn discard_selection(&mut self) {
        self.selection.discard();
        self.invalidate();
    }

    /// Ignores the committed selection until it is saved again.
    pub fn show_everything(&mut self) {
        self.show_all = true;
        self.pages.first();
        self.invalidate();
    }

    pub fn drill_down(&mut self, ip: Option<String>) {
        if self.drill_down != ip {
            self.drill_down = ip;
            self.pages.first();
            self.invalidate();
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    // pages

    fn subset_len(&mut self) -> usize {
        self.view().subset_len
    }

    pub fn go_to_page(&mut self, page: usize) -> usize {
        let len = self.subset_len();
        let page = self.pages.go_to(page, len);
        self.invalidate();
        page
    }

    pub fn next_page(&mut self) -> usize {
        let len = self.subset_len();
        let page = self.pages.next(len);
        self.invalidate();
        page
    }

    pub fn prev_page(&mut self) -> usize {
        let len = self.subset_len();
        let page = self.pages.prev(len);
        self.invalidate();
        page
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let len = self.subset_len();
        self.pages.set_page_size(page_size, len);
        self.invalidate();
    }

    // reads

    pub fn buffer(&self) -> &RecordBuffer {
        &self.buffer
    }

    pub fn usage(&self) -> BufferUsage {
        self.buffer.usage(self.near_capacity)
    }

    pub fn color_for(&self, ip: &str) -> &str {
        self.colorizer.color_for(ip)
    }

    pub fn view(&mut self) -> &DashboardView {
        let view = match self.view.take() {
            Some(view) => view,
            None => self.project(),
        };
        self.view.insert(view)
    }

    pub fn export_page(&mut self) -> Vec<ExportRow> {
        let view = self.view();
        page_rows(&view.page.rows, &view.stats)
    }

    fn project(&mut self) -> DashboardView {
        let filter = Filter {
            committed: self.selection.committed(),
            drill_down: self.drill_down.as_deref(),
            show_all: self.show_all,
        };
        let subset = filter.apply(self.buffer.iter());
        let stats = Statistics::aggregate(subset.iter().copied());
        let ranked = rank_domains(&stats).into_iter().cloned().collect();
        let top = TopDomains::from_stats(&stats, self.top_n);

        self.pages.clamp(subset.len());
        let page = PageView {
            number: self.pages.current(),
            total_pages: self.pages.total_pages(subset.len()),
            page_size: self.pages.page_size(),
            window: self.pages.window(subset.len()).collect(),
            rows: self.pages.slice(&subset).iter().map(|r| (*r).clone()).collect(),
        };

        let device_colors = stats
            .devices()
            .iter()
            .map(|d| (d.ip.clone(), self.colorizer.color_for(&d.ip).to_string()))
            .collect();

        DashboardView {
            usage: self.buffer.usage(self.near_capacity),
            subset_len: subset.len(),
            stats,
            ranked,
            top,
            page,
            device_colors,
            drill_down: self.drill_down.clone(),
            show_all: self.show_all,
            selection: self.selection.clone(),
        }
    }
}

impl Default for DashboardEngine {
    fn default() -> Self {
        DashboardEngine {
            buffer: RecordBuffer::new(),
            selection: Selection::new(),
            drill_down: None,
            show_all: false,
            pages: Paginator::default(),
            top_n: crate::rank::DEFAULT_TOP_N,
            near_capacity: crate::buffer::NEAR_CAPACITY_THRESHOLD,
            colorizer: Colorizer::default(),
            issued: 0,
            applied: 0,
            view: None,
        }
    }
}
