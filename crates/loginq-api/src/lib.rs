// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod error;

pub use error::ApiError;

use anyhow::{Context, Result, bail};
use loginq_app::{LeadId, LeadRecord, LoanType, StatusGroup, UserSummary, format_date};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;
use time::Date;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Query for one department's lead list. Unset fields are left off the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadListParams {
    pub department: String,
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub loan_type: Option<String>,
    pub no_activity_date: Option<Date>,
}

impl LeadListParams {
    pub fn for_department(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            ..Self::default()
        }
    }

    /// `(name, value)` pairs actually sent, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(user_id) = &self.user_id {
            pairs.push(("user_id", user_id.clone()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(loan_type) = &self.loan_type {
            pairs.push(("loan_type", loan_type.clone()));
        }
        if let Some(date) = self.no_activity_date {
            pairs.push(("no_activity_date", format_date(date)));
        }
        pairs
    }
}

/// Remote side of the working set. The runtime only talks to this trait so
/// tests can swap in a scripted source.
pub trait LeadSource: Send + Sync {
    fn fetch_leads(&self, params: &LeadListParams) -> Result<Vec<LeadRecord>, ApiError>;

    /// Returns the server's copy of the lead when the response carries one.
    fn update_status(
        &self,
        lead_id: &LeadId,
        status: &str,
        sub_status: &str,
    ) -> Result<Option<LeadRecord>, ApiError>;

    fn update_lead_fields(
        &self,
        lead_id: &LeadId,
        fields: &Map<String, Value>,
    ) -> Result<Option<LeadRecord>, ApiError>;

    fn fetch_status_taxonomy(&self, department: &str) -> Result<Vec<StatusGroup>, ApiError>;

    fn fetch_users(&self, department: Option<&str>) -> Result<Vec<UserSummary>, ApiError>;

    fn fetch_loan_types(&self) -> Result<Vec<LoanType>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            bail!("api.base_url {trimmed:?} must be an http(s) URL like https://crm.example.com/api");
        }
        if timeout.is_zero() {
            bail!("api.timeout must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: parsed,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, ApiError> {
        tracing::debug!(%url, "lead service request");
        let response = request
            .send()
            .map_err(|error| self.transport_error(url, error))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| self.transport_error(url, error))?;
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "lead service rejected request");
            return Err(clean_error_response(status, &body));
        }
        Ok(body)
    }

    fn transport_error(&self, url: &Url, error: reqwest::Error) -> ApiError {
        ApiError::from_transport(self.base_url(), url.as_str(), self.timeout, error)
    }

    fn get_list<T: DeserializeOwned>(&self, url: Url, what: &'static str) -> Result<Vec<T>, ApiError> {
        let body = self.send(self.http.get(url.clone()), &url)?;
        decode_list(&body, what)
    }
}

impl LeadSource for Client {
    fn fetch_leads(&self, params: &LeadListParams) -> Result<Vec<LeadRecord>, ApiError> {
        let mut url = self.endpoint(&["leads", "department", params.department.as_str()]);
        {
            let pairs = params.query_pairs();
            if !pairs.is_empty() {
                let mut query = url.query_pairs_mut();
                for (name, value) in &pairs {
                    query.append_pair(name, value);
                }
            }
        }
        let leads: Vec<LeadRecord> = self.get_list(url, "lead list")?;
        tracing::info!(department = %params.department, count = leads.len(), "fetched leads");
        Ok(leads)
    }

    fn update_status(
        &self,
        lead_id: &LeadId,
        status: &str,
        sub_status: &str,
    ) -> Result<Option<LeadRecord>, ApiError> {
        let url = self.endpoint(&["leads", lead_id.as_str(), "status"]);
        let request = self
            .http
            .put(url.clone())
            .json(&json!({ "status": status, "sub_status": sub_status }));
        let body = self.send(request, &url)?;
        Ok(decode_single_lead(&body))
    }

    fn update_lead_fields(
        &self,
        lead_id: &LeadId,
        fields: &Map<String, Value>,
    ) -> Result<Option<LeadRecord>, ApiError> {
        let url = self.endpoint(&["leads", lead_id.as_str()]);
        let request = self.http.put(url.clone()).json(fields);
        let body = self.send(request, &url)?;
        Ok(decode_single_lead(&body))
    }

    fn fetch_status_taxonomy(&self, department: &str) -> Result<Vec<StatusGroup>, ApiError> {
        let url = self.endpoint(&["status-taxonomy", department]);
        self.get_list(url, "status taxonomy")
    }

    fn fetch_users(&self, department: Option<&str>) -> Result<Vec<UserSummary>, ApiError> {
        let mut url = self.endpoint(&["users"]);
        if let Some(department) = department {
            url.query_pairs_mut().append_pair("department", department);
        }
        self.get_list(url, "user directory")
    }

    fn fetch_loan_types(&self) -> Result<Vec<LoanType>, ApiError> {
        let url = self.endpoint(&["loan-types"]);
        self.get_list(url, "loan types")
    }
}

/// List responses come either wrapped as `{"data": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Wrapped { data: Vec<Value> },
    Bare(Vec<Value>),
}

impl ListEnvelope {
    fn into_items(self) -> Vec<Value> {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Decodes a list, skipping items that do not fit `T` rather than failing
/// the whole page.
fn decode_list<T: DeserializeOwned>(body: &str, what: &'static str) -> Result<Vec<T>, ApiError> {
    let envelope: ListEnvelope =
        serde_json::from_str(body).map_err(|source| ApiError::Decode { what, source })?;
    let items = envelope.into_items();
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(what, index, %error, "skipping malformed item");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        tracing::warn!(what, skipped = total - decoded.len(), total, "some items were malformed");
    }
    Ok(decoded)
}

fn decode_single_lead(body: &str) -> Option<LeadRecord> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = match value {
        Value::Object(mut object) => match object.remove("data") {
            Some(data @ Value::Object(_)) => data,
            Some(_) => return None,
            None => Value::Object(object),
        },
        _ => return None,
    };
    serde_json::from_value(candidate).ok()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let status_code = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let nested = parsed.error.as_ref().and_then(|error| match error {
            Value::String(message) => Some(message.clone()),
            Value::Object(object) => object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        });
        if let Some(message) = parsed.message.or(nested)
            && !message.is_empty()
        {
            return ApiError::Status {
                status: status_code,
                message,
            };
        }
    }

    let message = if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        body.trim().to_owned()
    } else {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_owned()
    };
    ApiError::Status {
        status: status_code,
        message,
    }
}
