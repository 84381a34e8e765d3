// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::ids::*;

pub const PHONE_FIELD_COUNT: usize = 4;

/// A lead as held in memory. Wire quirks (status objects, numeric phones,
/// timestamp-shaped dates) are normalized during deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(alias = "_id")]
    pub id: LeadId,
    #[serde(default, alias = "customLeadId", deserialize_with = "de_opt_text")]
    pub custom_lead_id: Option<String>,
    #[serde(default, deserialize_with = "de_status_name")]
    pub status: Option<String>,
    #[serde(default, alias = "subStatus", deserialize_with = "de_status_name")]
    pub sub_status: Option<String>,
    #[serde(default, alias = "loanTypeId", deserialize_with = "de_opt_text")]
    pub loan_type_id: Option<String>,
    #[serde(default, alias = "loanTypeName", deserialize_with = "de_opt_text")]
    pub loan_type_name: Option<String>,
    #[serde(default, alias = "createdBy", deserialize_with = "de_status_name")]
    pub created_by: Option<String>,
    #[serde(default, alias = "teamName", deserialize_with = "de_opt_text")]
    pub team_name: Option<String>,
    #[serde(default, alias = "assignedTL", deserialize_with = "de_status_name")]
    pub assigned_tl: Option<String>,
    #[serde(default, alias = "channelName", deserialize_with = "de_opt_text")]
    pub channel_name: Option<String>,
    #[serde(default, alias = "loginDepartment", deserialize_with = "de_status_name")]
    pub login_department: Option<String>,
    #[serde(default, alias = "mobileNumber", deserialize_with = "de_opt_text")]
    pub mobile_number: Option<String>,
    #[serde(default, alias = "alternateMobileNumber", deserialize_with = "de_opt_text")]
    pub alternate_mobile_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub phone: Option<String>,
    #[serde(default, alias = "alternatePhone", deserialize_with = "de_opt_text")]
    pub alternate_phone: Option<String>,
    #[serde(
        default,
        alias = "loginDate",
        deserialize_with = "de_lenient_date",
        serialize_with = "ser_opt_date"
    )]
    pub login_date: Option<Date>,
    #[serde(
        default,
        alias = "disbursementDate",
        deserialize_with = "de_lenient_date",
        serialize_with = "ser_opt_date"
    )]
    pub disbursement_date: Option<Date>,
    #[serde(default, alias = "fileSentToLogin", deserialize_with = "de_lenient_bool")]
    pub file_sent_to_login: bool,
    #[serde(default, alias = "dynamicFields", deserialize_with = "de_object_or_empty")]
    pub dynamic_fields: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeadRecord {
    pub fn blank(id: impl Into<LeadId>) -> Self {
        Self {
            id: id.into(),
            custom_lead_id: None,
            status: None,
            sub_status: None,
            loan_type_id: None,
            loan_type_name: None,
            created_by: None,
            team_name: None,
            assigned_tl: None,
            channel_name: None,
            login_department: None,
            mobile_number: None,
            alternate_mobile_number: None,
            phone: None,
            alternate_phone: None,
            login_date: None,
            disbursement_date: None,
            file_sent_to_login: false,
            dynamic_fields: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn phones(&self) -> [Option<&str>; PHONE_FIELD_COUNT] {
        [
            self.mobile_number.as_deref(),
            self.alternate_mobile_number.as_deref(),
            self.phone.as_deref(),
            self.alternate_phone.as_deref(),
        ]
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn sub_status(&self) -> Option<&str> {
        self.sub_status.as_deref()
    }
}

/// One main status with its ordered sub-statuses, as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusGroup {
    #[serde(deserialize_with = "de_required_name")]
    pub name: String,
    #[serde(default, alias = "subStatuses", deserialize_with = "de_name_list")]
    pub sub_statuses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(deserialize_with = "de_required_name")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub role: Option<String>,
    #[serde(default, alias = "teamName", deserialize_with = "de_opt_text")]
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanType {
    #[serde(alias = "_id")]
    pub id: LoanTypeId,
    #[serde(deserialize_with = "de_required_name")]
    pub name: String,
}

/// Renders a scalar JSON value as display text. Objects with a `name` key
/// collapse to that name; anything else that is empty becomes `None`.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            parts.join(", ")
        }
        Value::Object(object) => return object.get("name").and_then(value_text),
    };
    if text.is_empty() { None } else { Some(text) }
}

pub fn parse_lenient_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value.date());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Some(value.date());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.date());
    }
    // Some exports drop the time part but keep a trailing zone marker.
    raw.get(..10)
        .and_then(|prefix| Date::parse(prefix, &format_description!("[year]-[month]-[day]")).ok())
}

pub fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|value| match value {
        Value::Object(_) | Value::Array(_) => None,
        other => value_text(other),
    }))
}

fn de_status_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|value| match value {
        Value::Array(_) => None,
        other => value_text(other),
    }))
}

fn de_required_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_text(&value).ok_or_else(|| serde::de::Error::custom("name must be a non-empty string"))
}

fn de_name_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
        _ => Vec::new(),
    })
}

fn de_lenient_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => parse_lenient_date(&raw),
        _ => None,
    })
}

fn ser_opt_date<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(date) => serializer.serialize_some(&format_date(*date)),
        None => serializer.serialize_none(),
    }
}

fn de_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(raw)) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        _ => false,
    })
}

fn de_object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(object)) => object,
        _ => Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::{LeadRecord, StatusGroup, parse_lenient_date};
    use anyhow::Result;
    use serde_json::json;
    use time::{Date, Month};

    #[test]
    fn status_objects_collapse_to_plain_names() -> Result<()> {
        let record: LeadRecord = serde_json::from_value(json!({
            "_id": "L1",
            "status": {"name": "ACTIVE", "color": "green"},
            "sub_status": "NEW",
        }))?;
        assert_eq!(record.status(), Some("ACTIVE"));
        assert_eq!(record.sub_status(), Some("NEW"));
        Ok(())
    }

    #[test]
    fn numeric_lead_id_is_accepted() -> Result<()> {
        let record: LeadRecord = serde_json::from_value(json!({
            "_id": 73019,
            "status": "ACTIVE",
        }))?;
        assert_eq!(record.id.as_str(), "73019");
        assert_eq!(record.status(), Some("ACTIVE"));
        Ok(())
    }

    #[test]
    fn blank_and_null_status_are_absent() -> Result<()> {
        let record: LeadRecord = serde_json::from_value(json!({
            "_id": "L2",
            "status": "   ",
            "subStatus": null,
        }))?;
        assert_eq!(record.status, None);
        assert_eq!(record.sub_status, None);
        Ok(())
    }

    #[test]
    fn numeric_phones_and_string_flags_are_normalized() -> Result<()> {
        let record: LeadRecord = serde_json::from_value(json!({
            "_id": "L3",
            "mobile_number": 9876543210u64,
            "file_sent_to_login": "yes",
        }))?;
        assert_eq!(record.mobile_number.as_deref(), Some("9876543210"));
        assert!(record.file_sent_to_login);
        Ok(())
    }

    #[test]
    fn unknown_fields_are_kept_and_survive_a_cache_round_trip() -> Result<()> {
        let record: LeadRecord = serde_json::from_value(json!({
            "_id": "L4",
            "name": "Asha Verma",
            "login_date": "2026-03-04T10:15:00.000Z",
            "dynamic_fields": {"financial_details": {"monthly_income": "75000"}},
        }))?;
        assert_eq!(record.extra.get("name"), Some(&json!("Asha Verma")));
        assert_eq!(
            record.login_date,
            Some(Date::from_calendar_date(2026, Month::March, 4)?)
        );

        let cached = serde_json::to_string(&record)?;
        let restored: LeadRecord = serde_json::from_str(&cached)?;
        assert_eq!(restored, record);
        Ok(())
    }

    #[test]
    fn lenient_date_rejects_garbage() {
        assert!(parse_lenient_date("not a date").is_none());
        assert!(parse_lenient_date("").is_none());
    }

    #[test]
    fn status_group_accepts_object_sub_statuses() -> Result<()> {
        let group: StatusGroup = serde_json::from_value(json!({
            "name": "ACTIVE",
            "sub_statuses": [{"name": "NEW"}, "SENT", ""],
        }))?;
        assert_eq!(group.sub_statuses, vec!["NEW".to_owned(), "SENT".to_owned()]);
        Ok(())
    }
}
