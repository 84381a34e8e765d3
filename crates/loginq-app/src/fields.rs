// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Declarative lookup for values that live at different places on a lead.
//!
//! Every logical field owns an ordered candidate table. Resolution walks the
//! table and returns the first candidate that yields non-empty text.

use serde_json::Value;

use crate::model::{LeadRecord, value_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    CustomerName,
    CompanyName,
    City,
    Pincode,
    MonthlyIncome,
    LoanEligibility,
    RequiredLoanAmount,
    Email,
}

impl LogicalField {
    pub const ALL: [Self; 8] = [
        Self::CustomerName,
        Self::CompanyName,
        Self::City,
        Self::Pincode,
        Self::MonthlyIncome,
        Self::LoanEligibility,
        Self::RequiredLoanAmount,
        Self::Email,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::CustomerName => "customer name",
            Self::CompanyName => "company",
            Self::City => "city",
            Self::Pincode => "pincode",
            Self::MonthlyIncome => "monthly income",
            Self::LoanEligibility => "eligibility",
            Self::RequiredLoanAmount => "required loan amount",
            Self::Email => "email",
        }
    }

    pub const fn candidates(self) -> &'static [Candidate] {
        match self {
            Self::CustomerName => CUSTOMER_NAME,
            Self::CompanyName => COMPANY_NAME,
            Self::City => CITY,
            Self::Pincode => PINCODE,
            Self::MonthlyIncome => MONTHLY_INCOME,
            Self::LoanEligibility => LOAN_ELIGIBILITY,
            Self::RequiredLoanAmount => REQUIRED_LOAN_AMOUNT,
            Self::Email => EMAIL,
        }
    }
}

pub type Transform = fn(&Value) -> Option<String>;

#[derive(Clone, Copy)]
pub enum Candidate {
    /// Path from the record root. A leading `dynamic_fields` segment walks
    /// the dynamic bag; otherwise the first segment is a top-level key.
    Path(&'static [&'static str], Option<Transform>),
    Derived(fn(&LeadRecord) -> Option<String>),
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path, transform) => f
                .debug_struct("Path")
                .field("path", path)
                .field("transform", &transform.is_some())
                .finish(),
            Self::Derived(_) => f.write_str("Derived"),
        }
    }
}

const CUSTOMER_NAME: &[Candidate] = &[
    Candidate::Path(&["name"], None),
    Candidate::Path(&["customer_name"], None),
    Candidate::Derived(joined_first_last_name),
    Candidate::Path(&["dynamic_fields", "personal_details", "full_name"], None),
    Candidate::Path(&["dynamic_fields", "applicant", "name"], None),
];

const COMPANY_NAME: &[Candidate] = &[
    Candidate::Path(&["company_name"], None),
    Candidate::Path(&["dynamic_fields", "employment_details", "company_name"], None),
    Candidate::Path(&["dynamic_fields", "personal_details", "company_name"], None),
    Candidate::Path(&["dynamic_fields", "company_name"], None),
];

const CITY: &[Candidate] = &[
    Candidate::Path(&["city"], None),
    Candidate::Path(&["dynamic_fields", "address", "city"], None),
    Candidate::Path(&["dynamic_fields", "personal_details", "city"], None),
    Candidate::Path(&["dynamic_fields", "residence_address", "city"], None),
];

const PINCODE: &[Candidate] = &[
    Candidate::Path(&["pincode"], Some(digits_only)),
    Candidate::Path(&["postal_code"], Some(digits_only)),
    Candidate::Path(&["dynamic_fields", "address", "pincode"], Some(digits_only)),
    Candidate::Path(&["dynamic_fields", "personal_details", "pincode"], Some(digits_only)),
    Candidate::Path(&["dynamic_fields", "residence_address", "pincode"], Some(digits_only)),
];

const MONTHLY_INCOME: &[Candidate] = &[
    Candidate::Path(&["income"], Some(amount_text)),
    Candidate::Path(&["monthly_income"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "financial_details", "monthly_income"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "financial_details", "net_salary"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "income"], Some(amount_text)),
];

const LOAN_ELIGIBILITY: &[Candidate] = &[
    Candidate::Path(&["eligibility"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "eligibility_details", "final_eligibility"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "eligibility_details", "eligible_amount"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "check_eligibility", "loan_eligibility"], Some(amount_text)),
];

const REQUIRED_LOAN_AMOUNT: &[Candidate] = &[
    Candidate::Path(&["loan_amount"], Some(amount_text)),
    Candidate::Path(&["loan_amount_required"], Some(amount_text)),
    Candidate::Path(&["dynamic_fields", "financial_details", "loan_amount_required"], Some(amount_text)),
];

const EMAIL: &[Candidate] = &[
    Candidate::Path(&["email"], None),
    Candidate::Path(&["dynamic_fields", "personal_details", "email"], None),
    Candidate::Path(&["dynamic_fields", "personal_details", "personal_email"], None),
];

pub fn resolve(record: &LeadRecord, field: LogicalField) -> Option<String> {
    field
        .candidates()
        .iter()
        .find_map(|candidate| resolve_candidate(record, candidate))
}

/// Resolved value parsed as a number; missing or unparsable values read as 0.
pub fn resolve_amount(record: &LeadRecord, field: LogicalField) -> f64 {
    resolve(record, field)
        .as_deref()
        .and_then(parse_amount)
        .unwrap_or(0.0)
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, ',' | ' ' | '₹'))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

fn resolve_candidate(record: &LeadRecord, candidate: &Candidate) -> Option<String> {
    match candidate {
        Candidate::Path(path, transform) => {
            let value = lookup(record, path)?;
            let text = match transform {
                Some(transform) => transform(value),
                None => value_text(value),
            }?;
            if text.trim().is_empty() { None } else { Some(text) }
        }
        Candidate::Derived(derive) => derive(record),
    }
}

fn lookup<'a>(record: &'a LeadRecord, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    if *first == "dynamic_fields" {
        let (key, rest) = rest.split_first()?;
        return descend(record.dynamic_fields.get(*key)?, rest);
    }
    descend(record.extra.get(*first)?, rest)
}

fn descend<'a>(mut current: &'a Value, rest: &[&str]) -> Option<&'a Value> {
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

fn joined_first_last_name(record: &LeadRecord) -> Option<String> {
    let first = record.extra.get("first_name").and_then(value_text);
    let last = record.extra.get("last_name").and_then(value_text);
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first),
        (None, Some(last)) => Some(last),
        (None, None) => None,
    }
}

fn digits_only(value: &Value) -> Option<String> {
    let text = value_text(value)?;
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

fn amount_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        other => value_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{LogicalField, parse_amount, resolve, resolve_amount};
    use crate::LeadRecord;
    use anyhow::Result;
    use serde_json::json;

    fn lead(value: serde_json::Value) -> Result<LeadRecord> {
        Ok(serde_json::from_value(value)?)
    }

    #[test]
    fn first_present_candidate_wins() -> Result<()> {
        let record = lead(json!({
            "_id": "L1",
            "name": "",
            "first_name": "Ravi",
            "last_name": "Kumar",
            "dynamic_fields": {"personal_details": {"full_name": "Ignored"}},
        }))?;
        assert_eq!(
            resolve(&record, LogicalField::CustomerName).as_deref(),
            Some("Ravi Kumar")
        );
        Ok(())
    }

    #[test]
    fn nested_dynamic_income_is_found_when_top_level_missing() -> Result<()> {
        let record = lead(json!({
            "_id": "L2",
            "dynamic_fields": {"financial_details": {"monthly_income": 75000}},
        }))?;
        assert_eq!(resolve_amount(&record, LogicalField::MonthlyIncome), 75000.0);
        Ok(())
    }

    #[test]
    fn arrays_are_joined_for_display() -> Result<()> {
        let record = lead(json!({
            "_id": "L3",
            "dynamic_fields": {"address": {"city": ["Pune", "Mumbai"]}},
        }))?;
        assert_eq!(
            resolve(&record, LogicalField::City).as_deref(),
            Some("Pune, Mumbai")
        );
        Ok(())
    }

    #[test]
    fn unparsable_amounts_default_to_zero() -> Result<()> {
        let record = lead(json!({"_id": "L4", "income": "about fifty"}))?;
        assert_eq!(resolve_amount(&record, LogicalField::MonthlyIncome), 0.0);
        assert_eq!(resolve_amount(&LeadRecord::blank("L5"), LogicalField::MonthlyIncome), 0.0);
        Ok(())
    }

    #[test]
    fn grouped_amounts_parse() {
        assert_eq!(parse_amount("1,25,000"), Some(125_000.0));
        assert_eq!(parse_amount("₹ 40000.50"), Some(40_000.5));
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn pincode_keeps_digits_only() -> Result<()> {
        let record = lead(json!({"_id": "L6", "pincode": "411 001"}))?;
        assert_eq!(resolve(&record, LogicalField::Pincode).as_deref(), Some("411001"));
        Ok(())
    }
}
