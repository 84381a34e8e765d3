// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The one predicate that decides which leads are shown. Row lists,
//! counters and pagination all consume [`apply`]'s output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::Date;

use crate::aggregate::{StatusBucket, bucket_for};
use crate::duplicates;
use crate::fields::{LogicalField, resolve, resolve_amount};
use crate::model::{LeadRecord, LoanType};

const LOAN_TYPE_SUFFIX: &str = " loan";

/// Legacy loan-type ids that predate the current catalogue, paired with the
/// name they stand for.
const LEGACY_LOAN_TYPE_ALIASES: [(&str, &str); 2] =
    [("pl", "Personal Loan"), ("bl", "Business Loan")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IncomeSort {
    #[default]
    None,
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, value: Option<Date>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        self.from.is_none_or(|from| value >= from) && self.to.is_none_or(|to| value <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IncomeRange {
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl IncomeRange {
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, income: f64) -> bool {
        let from = self.from.unwrap_or(0.0);
        let to = self.to.unwrap_or(f64::INFINITY);
        income >= from && income <= to
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub team_names: BTreeSet<String>,
    pub created_by: BTreeSet<String>,
    pub assigned_tl: BTreeSet<String>,
    pub channel_names: BTreeSet<String>,
    pub login_departments: BTreeSet<String>,
    pub selected_statuses: BTreeSet<String>,
    pub login_date: DateRange,
    pub disbursement_date: DateRange,
    pub income: IncomeRange,
    pub income_sort: IncomeSort,
    pub duplicates_only: bool,
    pub file_sent_to_login_only: bool,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusSelector {
    #[default]
    All,
    Bucket(StatusBucket),
}

/// Everything that changes which rows are visible.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeadQuery {
    pub filters: FilterState,
    pub search: String,
    pub loan_type: Option<LoanType>,
    pub status: StatusSelector,
}

pub fn apply<'a>(records: &'a [LeadRecord], query: &LeadQuery) -> Vec<&'a LeadRecord> {
    let filters = &query.filters;
    let needle = query.search.trim().to_lowercase();
    let flagged = filters.duplicates_only.then(|| duplicates::compute(records));

    let mut rows: Vec<&LeadRecord> = records
        .iter()
        .filter(|record| {
            query
                .loan_type
                .as_ref()
                .is_none_or(|loan_type| loan_type_matches(record, loan_type))
        })
        .filter(|record| match query.status {
            StatusSelector::All => true,
            StatusSelector::Bucket(bucket) => bucket_for(record.status()) == bucket,
        })
        .filter(|record| needle.is_empty() || matches_search(record, &needle))
        .filter(|record| filters.login_date.contains(record.login_date))
        .filter(|record| filters.disbursement_date.contains(record.disbursement_date))
        .filter(|record| member(&filters.team_names, record.team_name.as_deref()))
        .filter(|record| member(&filters.created_by, record.created_by.as_deref()))
        .filter(|record| member(&filters.assigned_tl, record.assigned_tl.as_deref()))
        .filter(|record| member(&filters.channel_names, record.channel_name.as_deref()))
        .filter(|record| member(&filters.login_departments, record.login_department.as_deref()))
        .filter(|record| member(&filters.selected_statuses, record.status()))
        .filter(|record| {
            filters.income.is_unbounded()
                || filters
                    .income
                    .contains(resolve_amount(record, LogicalField::MonthlyIncome))
        })
        .filter(|record| !filters.file_sent_to_login_only || record.file_sent_to_login)
        .filter(|record| {
            flagged
                .as_ref()
                .is_none_or(|flagged| flagged.contains(&record.id))
        })
        .collect();

    if filters.income_sort != IncomeSort::None {
        let mut keyed: Vec<(f64, &LeadRecord)> = rows
            .into_iter()
            .map(|record| (resolve_amount(record, LogicalField::MonthlyIncome), record))
            .collect();
        match filters.income_sort {
            IncomeSort::Ascending => keyed.sort_by(|a, b| a.0.total_cmp(&b.0)),
            IncomeSort::Descending => keyed.sort_by(|a, b| b.0.total_cmp(&a.0)),
            IncomeSort::None => {}
        }
        rows = keyed.into_iter().map(|(_, record)| record).collect();
    }

    rows
}

pub fn loan_type_matches(record: &LeadRecord, selected: &LoanType) -> bool {
    if record.loan_type_id.as_deref() == Some(selected.id.as_str()) {
        return true;
    }

    if let Some(name) = record.loan_type_name.as_deref()
        && same_loan_name(name, &selected.name)
    {
        return true;
    }

    LEGACY_LOAN_TYPE_ALIASES.iter().any(|(legacy_id, legacy_name)| {
        let record_is_legacy = record.loan_type_id.as_deref() == Some(*legacy_id)
            && same_loan_name(legacy_name, &selected.name);
        let selection_is_legacy = selected.id.as_str() == *legacy_id
            && record
                .loan_type_name
                .as_deref()
                .is_some_and(|name| same_loan_name(name, legacy_name));
        record_is_legacy || selection_is_legacy
    })
}

fn same_loan_name(left: &str, right: &str) -> bool {
    let left = strip_loan_suffix(left);
    !left.is_empty() && left == strip_loan_suffix(right)
}

fn strip_loan_suffix(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    match lowered.strip_suffix(LOAN_TYPE_SUFFIX) {
        Some(stripped) => stripped.trim_end().to_owned(),
        None => lowered,
    }
}

fn member(selected: &BTreeSet<String>, value: Option<&str>) -> bool {
    selected.is_empty() || value.is_some_and(|value| selected.contains(value.trim()))
}

fn matches_search(record: &LeadRecord, needle: &str) -> bool {
    let resolved = [
        LogicalField::CustomerName,
        LogicalField::CompanyName,
        LogicalField::City,
        LogicalField::Pincode,
    ]
    .into_iter()
    .filter_map(|field| resolve(record, field));

    let direct = record
        .phones()
        .into_iter()
        .chain([
            record.created_by.as_deref(),
            record.team_name.as_deref(),
            record.channel_name.as_deref(),
            record.status(),
            record.sub_status(),
            record.custom_lead_id.as_deref(),
        ])
        .flatten()
        .map(str::to_owned);

    resolved
        .chain(direct)
        .any(|haystack| haystack.to_lowercase().contains(needle))
}
