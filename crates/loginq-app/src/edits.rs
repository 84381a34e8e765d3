// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::duplicates::normalize_phone;
use crate::fields::parse_amount;
use crate::ids::LeadId;
use crate::model::{LeadRecord, format_date, parse_lenient_date};

/// Lead fields editable from the detail view, keyed by their wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadField {
    CustomerName,
    CompanyName,
    City,
    Pincode,
    MonthlyIncome,
    RequiredLoanAmount,
    Email,
    MobileNumber,
    AlternateMobileNumber,
    LoginDate,
    DisbursementDate,
    FileSentToLogin,
}

impl LeadField {
    pub const ALL: [Self; 12] = [
        Self::CustomerName,
        Self::CompanyName,
        Self::City,
        Self::Pincode,
        Self::MonthlyIncome,
        Self::RequiredLoanAmount,
        Self::Email,
        Self::MobileNumber,
        Self::AlternateMobileNumber,
        Self::LoginDate,
        Self::DisbursementDate,
        Self::FileSentToLogin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomerName => "name",
            Self::CompanyName => "company_name",
            Self::City => "city",
            Self::Pincode => "pincode",
            Self::MonthlyIncome => "income",
            Self::RequiredLoanAmount => "loan_amount",
            Self::Email => "email",
            Self::MobileNumber => "mobile_number",
            Self::AlternateMobileNumber => "alternate_mobile_number",
            Self::LoginDate => "login_date",
            Self::DisbursementDate => "disbursement_date",
            Self::FileSentToLogin => "file_sent_to_login",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CustomerName => "customer name",
            Self::CompanyName => "company",
            Self::City => "city",
            Self::Pincode => "pincode",
            Self::MonthlyIncome => "monthly income",
            Self::RequiredLoanAmount => "required loan amount",
            Self::Email => "email",
            Self::MobileNumber => "mobile number",
            Self::AlternateMobileNumber => "alternate mobile number",
            Self::LoginDate => "login date",
            Self::DisbursementDate => "disbursement date",
            Self::FileSentToLogin => "file sent to login",
        }
    }

    const fn is_required(self) -> bool {
        matches!(self, Self::CustomerName | Self::MobileNumber)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub lead_id: LeadId,
    pub field: LeadField,
    pub value: String,
}

impl FieldEdit {
    pub fn new(lead_id: impl Into<LeadId>, field: LeadField, value: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            field,
            value: value.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.wire_value().map(|_| ())
    }

    /// Value as sent to the backend. Blank optional fields become `null`.
    pub fn wire_value(&self) -> Result<Value> {
        let field = self.field;
        let raw = self.value.trim();
        if raw.is_empty() {
            if field.is_required() {
                bail!("{} is required -- enter a value and retry", field.label());
            }
            return Ok(Value::Null);
        }

        let value = match field {
            LeadField::CustomerName | LeadField::CompanyName | LeadField::City => {
                Value::String(raw.to_owned())
            }
            LeadField::Pincode => {
                if raw.len() != 6 || !raw.chars().all(|ch| ch.is_ascii_digit()) {
                    bail!("pincode {raw:?} must be exactly 6 digits");
                }
                Value::String(raw.to_owned())
            }
            LeadField::MonthlyIncome | LeadField::RequiredLoanAmount => {
                let Some(amount) = parse_amount(raw) else {
                    bail!("{} {raw:?} is not a number -- enter digits only", field.label());
                };
                if amount < 0.0 {
                    bail!("{} cannot be negative", field.label());
                }
                amount_value(amount)
            }
            LeadField::Email => {
                let valid = raw
                    .split_once('@')
                    .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
                if !valid {
                    bail!("email {raw:?} is not a valid address");
                }
                Value::String(raw.to_owned())
            }
            LeadField::MobileNumber | LeadField::AlternateMobileNumber => {
                let Some(phone) = normalize_phone(raw) else {
                    bail!(
                        "{} {raw:?} needs at least 10 digits",
                        field.label()
                    );
                };
                Value::String(phone)
            }
            LeadField::LoginDate | LeadField::DisbursementDate => {
                let Some(date) = parse_lenient_date(raw) else {
                    bail!(
                        "{} {raw:?} is not a date -- use YYYY-MM-DD",
                        field.label()
                    );
                };
                Value::String(format_date(date))
            }
            LeadField::FileSentToLogin => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Value::Bool(true),
                "false" | "no" | "n" | "0" => Value::Bool(false),
                _ => bail!("file sent to login must be yes or no, got {raw:?}"),
            },
        };
        Ok(value)
    }

    /// Writes the validated value into the in-memory record.
    pub fn apply_to(&self, record: &mut LeadRecord) -> Result<()> {
        let value = self.wire_value()?;
        let text = match &value {
            Value::String(text) => Some(text.clone()),
            _ => None,
        };
        match self.field {
            LeadField::MobileNumber => record.mobile_number = text,
            LeadField::AlternateMobileNumber => record.alternate_mobile_number = text,
            LeadField::LoginDate => {
                record.login_date = text.as_deref().and_then(parse_lenient_date);
            }
            LeadField::DisbursementDate => {
                record.disbursement_date = text.as_deref().and_then(parse_lenient_date);
            }
            LeadField::FileSentToLogin => {
                record.file_sent_to_login = value.as_bool().unwrap_or(false);
            }
            field => {
                if value.is_null() {
                    record.extra.remove(field.as_str());
                } else {
                    record.extra.insert(field.as_str().to_owned(), value);
                }
            }
        }
        Ok(())
    }
}

fn amount_value(amount: f64) -> Value {
    // Whole rupee amounts go out as integers so they render without ".0".
    if amount.fract() == 0.0 && amount <= 9_007_199_254_740_992.0 {
        return Value::from(amount as i64);
    }
    serde_json::Number::from_f64(amount).map_or(Value::Null, Value::Number)
}

/// Folds a batch of edits for one lead into the body of a field update.
pub fn edit_body<'a>(edits: impl IntoIterator<Item = &'a FieldEdit>) -> Result<Map<String, Value>> {
    let mut body = Map::new();
    for edit in edits {
        body.insert(edit.field.as_str().to_owned(), edit.wire_value()?);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::{FieldEdit, LeadField, edit_body};
    use crate::{LeadRecord, LogicalField, resolve};
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn field_names_round_trip() {
        for field in LeadField::ALL {
            assert_eq!(LeadField::parse(field.as_str()), Some(field));
        }
        assert_eq!(LeadField::parse("nope"), None);
    }

    #[test]
    fn required_fields_reject_blank() {
        let error = FieldEdit::new("L1", LeadField::CustomerName, "   ")
            .validate()
            .expect_err("blank name should fail");
        assert!(error.to_string().contains("customer name is required"));
        FieldEdit::new("L1", LeadField::City, "").validate()
            .expect("blank optional field is allowed");
    }

    #[test]
    fn typed_fields_validate_their_shape() {
        assert!(FieldEdit::new("L1", LeadField::Pincode, "56001").validate().is_err());
        assert!(FieldEdit::new("L1", LeadField::Email, "ravi@").validate().is_err());
        assert!(FieldEdit::new("L1", LeadField::MonthlyIncome, "-10").validate().is_err());
        assert!(FieldEdit::new("L1", LeadField::MobileNumber, "12345").validate().is_err());
        assert!(FieldEdit::new("L1", LeadField::LoginDate, "someday").validate().is_err());
        assert!(FieldEdit::new("L1", LeadField::FileSentToLogin, "maybe").validate().is_err());
    }

    #[test]
    fn apply_updates_resolved_view() -> Result<()> {
        let mut record = LeadRecord::blank("L1");
        FieldEdit::new("L1", LeadField::CustomerName, "Ravi Kumar").apply_to(&mut record)?;
        FieldEdit::new("L1", LeadField::MonthlyIncome, "45,000").apply_to(&mut record)?;
        FieldEdit::new("L1", LeadField::MobileNumber, "+91 98765-43210").apply_to(&mut record)?;
        FieldEdit::new("L1", LeadField::FileSentToLogin, "yes").apply_to(&mut record)?;

        assert_eq!(
            resolve(&record, LogicalField::CustomerName).as_deref(),
            Some("Ravi Kumar")
        );
        assert_eq!(
            resolve(&record, LogicalField::MonthlyIncome).as_deref(),
            Some("45000")
        );
        assert_eq!(record.mobile_number.as_deref(), Some("9876543210"));
        assert!(record.file_sent_to_login);
        Ok(())
    }

    #[test]
    fn body_collects_wire_values() -> Result<()> {
        let edits = [
            FieldEdit::new("L1", LeadField::City, "Pune"),
            FieldEdit::new("L1", LeadField::LoginDate, "2026-03-04"),
            FieldEdit::new("L1", LeadField::Email, ""),
        ];
        let body = edit_body(&edits)?;
        assert_eq!(
            serde_json::Value::Object(body),
            json!({"city": "Pune", "login_date": "2026-03-04", "email": null})
        );
        Ok(())
    }
}
