// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::filter::LeadQuery;

pub const INITIAL_WINDOW: usize = 50;
pub const WINDOW_STEP: usize = 100;

/// Progressive render window over the filtered rows.
///
/// The window snaps back to its initial size whenever the observed query
/// differs from the last one; anything outside `LeadQuery` leaves it alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    initial: usize,
    step: usize,
    visible: usize,
    last_query: Option<LeadQuery>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(INITIAL_WINDOW, WINDOW_STEP)
    }
}

impl Pagination {
    pub fn new(initial: usize, step: usize) -> Self {
        let initial = initial.max(1);
        Self {
            initial,
            step: step.max(1),
            visible: initial,
            last_query: None,
        }
    }

    pub const fn visible(&self) -> usize {
        self.visible
    }

    pub fn show_more(&mut self) {
        self.visible = self.visible.saturating_add(self.step);
    }

    pub fn reset(&mut self) {
        self.visible = self.initial;
    }

    /// Returns true when the query changed and the window was reset.
    pub fn observe(&mut self, query: &LeadQuery) -> bool {
        if self.last_query.as_ref() == Some(query) {
            return false;
        }
        let changed = self.last_query.is_some();
        self.last_query = Some(query.clone());
        self.reset();
        changed
    }

    pub fn window<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        &rows[..rows.len().min(self.visible)]
    }

    pub fn has_more(&self, total: usize) -> bool {
        total > self.visible
    }
}
