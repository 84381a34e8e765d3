// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use loginq_app::{LeadRecord, LoanType, LoanTypeId, StatusGroup, UserId, UserSummary};
use serde_json::{Value, json};
use std::path::PathBuf;
use time::macros::{date, datetime};
use time::{Date, Duration, OffsetDateTime};

const FIRST_NAMES: [&str; 16] = [
    "Aarav", "Priya", "Rohan", "Ananya", "Vikram", "Sneha", "Arjun", "Kavya", "Rahul", "Meera",
    "Karan", "Divya", "Siddharth", "Pooja", "Nikhil", "Isha",
];
const LAST_NAMES: [&str; 14] = [
    "Sharma", "Patel", "Iyer", "Reddy", "Nair", "Gupta", "Singh", "Kulkarni", "Menon", "Joshi",
    "Rao", "Verma", "Das", "Bose",
];
const CITIES: [&str; 10] = [
    "Mumbai",
    "Pune",
    "Bengaluru",
    "Hyderabad",
    "Chennai",
    "Delhi",
    "Ahmedabad",
    "Jaipur",
    "Kolkata",
    "Nagpur",
];
const COMPANIES: [&str; 8] = [
    "Infosys",
    "Tata Steel",
    "Reliance Retail",
    "Wipro",
    "HDFC Bank",
    "Mahindra Logistics",
    "Zomato",
    "Self Employed",
];
const TEAMS: [&str; 4] = ["North", "South", "West", "Central"];
const CHANNELS: [&str; 4] = ["Direct", "DSA", "Referral", "Digital"];
const CREATORS: [&str; 6] = [
    "Amit Shah",
    "Neha Kapoor",
    "Ravi Teja",
    "Sunita Rao",
    "Farhan Ali",
    "Deepa Menon",
];
const TEAM_LEADS: [&str; 3] = ["Manoj Pillai", "Shreya Ghosh", "Vivek Anand"];
const DEPARTMENTS: [&str; 3] = ["Sales", "Login", "Operations"];

const STATUS_TREE: [(&str, &[&str]); 5] = [
    ("Active Login", &["New File", "Documents Pending", "Sent To Bank"]),
    ("Approve", &[]),
    ("Disbursed", &["Part Disbursed", "Fully Disbursed"]),
    ("Reject", &["CIBIL Low", "Income Mismatch", "Policy Reject"]),
    ("Lost Login", &["Customer Not Interested", "Not Reachable"]),
];

const LOAN_TYPES: [(&str, &str); 4] = [
    ("lt-personal", "Personal Loan"),
    ("lt-business", "Business Loan"),
    ("lt-home", "Home Loan"),
    ("lt-lap", "Loan Against Property"),
];

/// Every Nth generated lead reuses an earlier lead's mobile number in its
/// alternate phone slot, formatted differently.
pub const SHARED_PHONE_EVERY: usize = 7;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Generates wire-shaped lead payloads. The same seed always yields the
/// same leads, including the mix of field spellings the backend sends.
#[derive(Debug, Clone)]
pub struct LeadFaker {
    rng: DeterministicRng,
}

impl LeadFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// One lead as the backend would serialize it.
    pub fn lead_json(&mut self, index: usize) -> Value {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let (status, subs) = STATUS_TREE[self.rng.int_n(STATUS_TREE.len())];
        let sub_status = if subs.is_empty() {
            Value::Null
        } else {
            json!(subs[self.rng.int_n(subs.len())])
        };
        let (loan_type_id, loan_type_name) = LOAN_TYPES[self.rng.int_n(LOAN_TYPES.len())];
        let income = 15_000 + self.rng.int_n(186) as u64 * 1_000;
        let login_date = reference_date() - Duration::days(self.rng.int_n(120) as i64);

        let mut lead = json!({
            "_id": format!("lead-{index:04}"),
            "custom_lead_id": format!("LQ{:06}", 100_000 + index),
            "loan_type_id": loan_type_id,
            "loan_type_name": loan_type_name,
            "created_by": {"name": self.pick(&CREATORS)},
            "team_name": self.pick(&TEAMS),
            "assigned_tl": self.pick(&TEAM_LEADS),
            "channel_name": self.pick(&CHANNELS),
            "login_department": self.pick(&DEPARTMENTS),
            "mobile_number": mobile_for(index),
            "file_sent_to_login": self.rng.bool(),
            "login_date": format!("{login_date}T10:15:00Z"),
            "city": self.pick(&CITIES),
            "pincode": format!("{}", 400_001 + self.rng.int_n(200_000)),
        });

        // Alternate between flat and nested layouts for the resolved fields.
        if self.rng.bool() {
            lead["name"] = json!(format!("{first} {last}"));
            lead["company_name"] = json!(self.pick(&COMPANIES));
            lead["income"] = json!(income);
        } else {
            lead["first_name"] = json!(first);
            lead["last_name"] = json!(last);
            lead["dynamic_fields"] = json!({
                "employment_details": {"company_name": self.pick(&COMPANIES)},
                "financial_details": {"monthly_income": income.to_string()},
            });
        }

        // Status arrives as a plain string or as a {name} object.
        if self.rng.bool() {
            lead["status"] = json!(status);
            lead["sub_status"] = sub_status;
        } else {
            lead["status"] = json!({"name": status});
            lead["sub_status"] = match sub_status {
                Value::Null => Value::Null,
                name => json!({ "name": name }),
            };
        }

        if status == "Disbursed" {
            let disbursed = login_date + Duration::days(self.rng.int_n(30) as i64 + 1);
            lead["disbursement_date"] = json!(disbursed.to_string());
        }

        if index > 0 && index % SHARED_PHONE_EVERY == 0 {
            let shared = mobile_for(index - 3);
            lead["alternate_phone"] = json!(format!("+91 {}-{}", &shared[..5], &shared[5..]));
        }
        lead
    }

    pub fn lead(&mut self, index: usize) -> Result<LeadRecord> {
        let value = self.lead_json(index);
        serde_json::from_value(value).with_context(|| format!("decode fixture lead {index}"))
    }

    pub fn leads(&mut self, count: usize) -> Result<Vec<LeadRecord>> {
        (0..count).map(|index| self.lead(index)).collect()
    }

    pub fn leads_json(&mut self, count: usize) -> Value {
        Value::Array((0..count).map(|index| self.lead_json(index)).collect())
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn status_groups() -> Vec<StatusGroup> {
    STATUS_TREE
        .iter()
        .map(|(name, subs)| StatusGroup {
            name: (*name).to_owned(),
            sub_statuses: subs.iter().map(|sub| (*sub).to_owned()).collect(),
        })
        .collect()
}

pub fn loan_types() -> Vec<LoanType> {
    LOAN_TYPES
        .iter()
        .map(|(id, name)| LoanType {
            id: LoanTypeId::from(*id),
            name: (*name).to_owned(),
        })
        .collect()
}

pub fn users() -> Vec<UserSummary> {
    CREATORS
        .iter()
        .enumerate()
        .map(|(index, name)| UserSummary {
            id: UserId::from(format!("user-{index}")),
            name: (*name).to_owned(),
            role: Some(role_for(index).to_owned()),
            team_name: Some(TEAMS[index % TEAMS.len()].to_owned()),
        })
        .collect()
}

pub fn team_names() -> &'static [&'static str] {
    &TEAMS
}

pub fn temp_cache_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("loginq-cache.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

/// Fixed instant used as "now" by fixture clocks.
pub fn fixture_now() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

fn reference_date() -> Date {
    date!(2026-02-19)
}

fn role_for(index: usize) -> &'static str {
    if index == 0 { "Team Leader" } else { "Executive" }
}

fn mobile_for(index: usize) -> String {
    format!("9{:09}", 800_000_000 + index * 7_919)
}

#[cfg(test)]
mod tests {
    use super::{LeadFaker, SHARED_PHONE_EVERY, status_groups};
    use anyhow::Result;
    use loginq_app::{StatusTaxonomy, duplicates};

    #[test]
    fn new_deterministic_seed() {
        let mut left = LeadFaker::new(42);
        let mut right = LeadFaker::new(42);
        assert_eq!(left.lead_json(3), right.lead_json(3));
    }

    #[test]
    fn every_lead_decodes_with_a_status() -> Result<()> {
        let leads = LeadFaker::new(7).leads(40)?;
        assert_eq!(leads.len(), 40);
        for lead in &leads {
            assert!(lead.status().is_some(), "lead {}", lead.id);
            assert!(lead.login_date.is_some(), "lead {}", lead.id);
        }
        Ok(())
    }

    #[test]
    fn shared_phones_produce_duplicates() -> Result<()> {
        let leads = LeadFaker::new(9).leads(SHARED_PHONE_EVERY + 1)?;
        let flagged = duplicates::compute(&leads);
        assert_eq!(flagged.len(), 2);
        Ok(())
    }

    #[test]
    fn fixture_taxonomy_is_valid() -> Result<()> {
        let taxonomy = StatusTaxonomy::new(status_groups())?;
        assert_eq!(taxonomy.main_status_of("CIBIL Low"), Some("Reject"));
        Ok(())
    }
}
