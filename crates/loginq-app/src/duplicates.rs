// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeSet, HashMap};

use crate::ids::LeadId;
use crate::model::LeadRecord;

pub const MIN_PHONE_DIGITS: usize = 10;

/// Strips everything but ASCII digits. Results shorter than ten digits are
/// not usable as a duplicate key.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let digits = if digits.len() > MIN_PHONE_DIGITS {
        // Country prefixes (+91, 0091, leading 0) collapse onto the subscriber number.
        digits[digits.len() - MIN_PHONE_DIGITS..].to_owned()
    } else {
        digits
    };
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

pub fn record_phones(record: &LeadRecord) -> Vec<String> {
    let mut phones: Vec<String> = Vec::with_capacity(record.phones().len());
    for phone in record.phones().into_iter().flatten() {
        if let Some(normalized) = normalize_phone(phone)
            && !phones.contains(&normalized)
        {
            phones.push(normalized);
        }
    }
    phones
}

/// Ids of every record that shares a normalized phone with a different record.
pub fn compute(records: &[LeadRecord]) -> BTreeSet<LeadId> {
    let mut owners: HashMap<String, Vec<&LeadId>> = HashMap::new();
    for record in records {
        for phone in record_phones(record) {
            let entry = owners.entry(phone).or_default();
            if !entry.contains(&&record.id) {
                entry.push(&record.id);
            }
        }
    }

    owners
        .into_values()
        .filter(|ids| ids.len() >= 2)
        .flatten()
        .cloned()
        .collect()
}
