// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the lead service. Timeouts are their own kind so the
/// UI can say "slow" instead of "broken".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} timed out after {}s -- the lead service is slow; retry shortly", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("cannot reach {base_url} -- check api.base_url and your network ({source})")]
    Connect {
        base_url: String,
        source: reqwest::Error,
    },

    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl ApiError {
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn from_transport(
        base_url: &str,
        url: &str,
        timeout: Duration,
        error: reqwest::Error,
    ) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                url: url.to_owned(),
                timeout,
            };
        }
        if error.is_connect() {
            return Self::Connect {
                base_url: base_url.to_owned(),
                source: error,
            };
        }
        Self::Request(error)
    }
}
