//! Domain selection and device drill-down.
//!
//! Selection marks domains to *hide*: as soon as one domain in the committed
//! set is selected, every record for a selected domain is dropped from the
//! working subset. An all-false (or empty) set lets everything through.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::domain::ObservationRecord;

pub type SelectionSet = BTreeMap<String, bool>;

/// Working and committed generations of the domain selection. Edits only
/// touch the working set; `save` copies it over the committed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    working: SelectionSet,
    committed: SelectionSet,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds domains not seen before as unselected. Existing choices stay.
    pub fn register<'a>(&mut self, domains: impl IntoIterator<Item = &'a str>) -> usize {
        let mut added = 0;
        for domain in domains {
            if !self.working.contains_key(domain) {
                self.working.insert(domain.to_string(), false);
                added += 1;
            }
        }
        added
    }

    pub fn toggle(&mut self, domain: &str) -> bool {
        let entry = self.working.entry(domain.to_string()).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn set(&mut self, domain: &str, selected: bool) {
        self.working.insert(domain.to_string(), selected);
    }

    /// Select-all button: if every known domain is selected, clear them all,
    /// otherwise select them all.
    pub fn toggle_all(&mut self) {
        let target = !self.all_selected();
        for value in self.working.values_mut() {
            *value = target;
        }
    }

    pub fn all_selected(&self) -> bool {
        self.working.values().all(|selected| *selected)
    }

    pub fn is_selected(&self, domain: &str) -> bool {
        self.working.get(domain).copied().unwrap_or(false)
    }

    /// Commits the working set. Returns false when nothing changed.
    pub fn save(&mut self) -> bool {
        if self.committed == self.working {
            return false;
        }
        self.committed = self.working.clone();
        true
    }

    pub fn discard(&mut self) {
        self.working = self.committed.clone();
    }

    pub fn working(&self) -> &SelectionSet {
        &self.working
    }

    pub fn committed(&self) -> &SelectionSet {
        &self.committed
    }

    pub fn selected_count(&self) -> usize {
        self.working.values().filter(|selected| **selected).count()
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Case-insensitive substring search over the known domains.
    pub fn search(&self, term: &str) -> Vec<&str> {
        let needle = term.to_lowercase();
        self.working
            .keys()
            .filter(|domain| domain.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}

/// Everything that narrows the buffer down to the working subset.
#[derive(Debug, Clone, Copy)]
pub struct Filter<'a> {
    pub committed: &'a SelectionSet,
    pub drill_down: Option<&'a str>,
    pub show_all: bool,
}

impl<'a> Filter<'a> {
    fn hides_domains(&self) -> bool {
        !self.show_all && self.committed.values().any(|selected| *selected)
    }

    pub fn admits(&self, record: &ObservationRecord) -> bool {
        if let Some(ip) = self.drill_down {
            if record.ip != ip {
                return false;
            }
        }
        if self.hides_domains() {
            return !self.committed.get(&record.domain).copied().unwrap_or(false);
        }
        true
    }

    pub fn apply<'r>(
        &self,
        records: impl IntoIterator<Item = &'r ObservationRecord>,
    ) -> Vec<&'r ObservationRecord> {
        records.into_iter().filter(|record| self.admits(record)).collect()
    }
}
