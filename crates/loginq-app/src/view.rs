// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::aggregate::{StatusCounts, count};
use crate::duplicates;
use crate::filter::{LeadQuery, apply};
use crate::ids::LeadId;
use crate::model::LeadRecord;
use crate::pagination::Pagination;

/// Everything the list screen renders for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadView<'a> {
    pub rows: Vec<&'a LeadRecord>,
    pub counts: StatusCounts,
    pub total: usize,
    pub has_more: bool,
    pub duplicates: BTreeSet<LeadId>,
}

impl<'a> LeadView<'a> {
    /// Filters once, then derives counts and the visible window from that
    /// same row list.
    pub fn build(
        records: &'a [LeadRecord],
        query: &LeadQuery,
        pagination: &mut Pagination,
    ) -> Self {
        pagination.observe(query);
        let filtered = apply(records, query);
        let counts = count(filtered.iter().copied());
        let total = filtered.len();
        let rows = pagination.window(&filtered).to_vec();
        Self {
            rows,
            counts,
            total,
            has_more: pagination.has_more(total),
            duplicates: duplicates::compute(records),
        }
    }

    pub fn is_duplicate(&self, record: &LeadRecord) -> bool {
        self.duplicates.contains(&record.id)
    }
}

#[cfg(test)]
mod tests {
    use super::LeadView;
    use crate::{INITIAL_WINDOW, LeadQuery, LeadRecord, Pagination, StatusBucket, StatusSelector};

    fn records(count: usize) -> Vec<LeadRecord> {
        (0..count)
            .map(|index| {
                let mut record = LeadRecord::blank(format!("L{index}"));
                let status = if index % 3 == 0 { "Rejected" } else { "Active" };
                record.status = Some(status.to_owned());
                record
            })
            .collect()
    }

    #[test]
    fn counts_cover_all_filtered_rows_not_just_the_window() {
        let records = records(120);
        let mut pagination = Pagination::default();
        let view = LeadView::build(&records, &LeadQuery::default(), &mut pagination);

        assert_eq!(view.rows.len(), INITIAL_WINDOW);
        assert_eq!(view.total, 120);
        assert_eq!(view.counts.total(), 120);
        assert_eq!(view.counts.get(StatusBucket::Reject), 40);
        assert!(view.has_more);
    }

    #[test]
    fn status_selector_narrows_rows_and_counts_together() {
        let records = records(30);
        let mut pagination = Pagination::default();
        let query = LeadQuery {
            status: StatusSelector::Bucket(StatusBucket::Reject),
            ..LeadQuery::default()
        };
        let view = LeadView::build(&records, &query, &mut pagination);
        assert_eq!(view.total, 10);
        assert_eq!(view.counts.get(StatusBucket::Reject), 10);
        assert_eq!(view.counts.total(), view.total);
        assert!(!view.has_more);
    }
}
