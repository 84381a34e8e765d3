// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::model::LeadRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusBucket {
    ActiveLogin,
    Approve,
    Disbursed,
    Reject,
    LostLogin,
}

impl StatusBucket {
    pub const ALL: [Self; 5] = [
        Self::ActiveLogin,
        Self::Approve,
        Self::Disbursed,
        Self::Reject,
        Self::LostLogin,
    ];

    /// Bucket for statuses the synonym table does not know.
    pub const DEFAULT: Self = Self::ActiveLogin;

    pub const fn label(self) -> &'static str {
        match self {
            Self::ActiveLogin => "Active Login",
            Self::Approve => "Approve",
            Self::Disbursed => "Disbursed",
            Self::Reject => "Reject",
            Self::LostLogin => "Lost Login",
        }
    }
}

/// Lower-cased status spellings seen in the field, folded onto buckets.
const STATUS_SYNONYMS: &[(&str, StatusBucket)] = &[
    ("active", StatusBucket::ActiveLogin),
    ("active login", StatusBucket::ActiveLogin),
    ("active leads", StatusBucket::ActiveLogin),
    ("login", StatusBucket::ActiveLogin),
    ("approve", StatusBucket::Approve),
    ("approved", StatusBucket::Approve),
    ("sanctioned", StatusBucket::Approve),
    ("disbursed", StatusBucket::Disbursed),
    ("disbursement", StatusBucket::Disbursed),
    ("disbursal", StatusBucket::Disbursed),
    ("reject", StatusBucket::Reject),
    ("rejected", StatusBucket::Reject),
    ("declined", StatusBucket::Reject),
    ("lost", StatusBucket::LostLogin),
    ("lost login", StatusBucket::LostLogin),
    ("lost leads", StatusBucket::LostLogin),
    ("lost lead", StatusBucket::LostLogin),
];

pub fn bucket_for(status: Option<&str>) -> StatusBucket {
    let Some(status) = status else {
        return StatusBucket::DEFAULT;
    };
    let folded = status.trim().to_lowercase();
    STATUS_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == folded)
        .map_or(StatusBucket::DEFAULT, |(_, bucket)| *bucket)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active_login: usize,
    pub approve: usize,
    pub disbursed: usize,
    pub reject: usize,
    pub lost_login: usize,
}

impl StatusCounts {
    pub const fn get(&self, bucket: StatusBucket) -> usize {
        match bucket {
            StatusBucket::ActiveLogin => self.active_login,
            StatusBucket::Approve => self.approve,
            StatusBucket::Disbursed => self.disbursed,
            StatusBucket::Reject => self.reject,
            StatusBucket::LostLogin => self.lost_login,
        }
    }

    pub const fn total(&self) -> usize {
        self.active_login + self.approve + self.disbursed + self.reject + self.lost_login
    }

    fn bump(&mut self, bucket: StatusBucket) {
        let slot = match bucket {
            StatusBucket::ActiveLogin => &mut self.active_login,
            StatusBucket::Approve => &mut self.approve,
            StatusBucket::Disbursed => &mut self.disbursed,
            StatusBucket::Reject => &mut self.reject,
            StatusBucket::LostLogin => &mut self.lost_login,
        };
        *slot += 1;
    }
}

/// Counts the rows the filter engine already produced. Never re-filters.
pub fn count<'a>(filtered: impl IntoIterator<Item = &'a LeadRecord>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for record in filtered {
        counts.bump(bucket_for(record.status()));
    }
    counts
}
