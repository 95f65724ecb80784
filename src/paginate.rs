use std::ops::RangeInclusive;

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Page buttons shown around the current page.
pub const PAGE_WINDOW: usize = 5;

/// Current page position over a collection whose length may change between
/// calls. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginator {
    page_size: usize,
    current: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Paginator {
            page_size: page_size.max(1),
            current: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    pub fn go_to(&mut self, page: usize, len: usize) -> usize {
        self.current = page.clamp(1, self.total_pages(len));
        self.current
    }

    pub fn next(&mut self, len: usize) -> usize {
        self.go_to(self.current.saturating_add(1), len)
    }

    pub fn prev(&mut self, len: usize) -> usize {
        self.go_to(self.current.saturating_sub(1), len)
    }

    pub fn first(&mut self) {
        self.current = 1;
    }

    pub fn last(&mut self, len: usize) -> usize {
        self.go_to(usize::MAX, len)
    }

    /// Pulls the current page back inside the collection after it shrank.
    pub fn clamp(&mut self, len: usize) -> usize {
        self.go_to(self.current, len)
    }

    pub fn set_page_size(&mut self, page_size: usize, len: usize) {
        self.page_size = page_size.max(1);
        self.clamp(len);
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.current - 1).saturating_mul(self.page_size).min(items.len());
        let end = start.saturating_add(self.page_size).min(items.len());
        &items[start..end]
    }

    /// Up to `PAGE_WINDOW` page numbers centred on the current page and
    /// shifted to stay inside `1..=total`.
    pub fn window(&self, len: usize) -> RangeInclusive<usize> {
        let total = self.total_pages(len);
        if total <= PAGE_WINDOW {
            return 1..=total;
        }
        let half = PAGE_WINDOW / 2;
        let start = self
            .current
            .saturating_sub(half)
            .max(1)
            .min(total + 1 - PAGE_WINDOW);
        start..=start + PAGE_WINDOW - 1
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
