// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ids arrive as strings from most endpoints and as integers from a few.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

fn de_lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text.trim().to_owned(),
        RawId::Unsigned(number) => number.to_string(),
        RawId::Signed(number) => number.to_string(),
    };
    if text.is_empty() {
        return Err(serde::de::Error::custom("id must not be empty"));
    }
    Ok(text)
}

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "de_lenient_id")] String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(LeadId);
entity_id!(UserId);
entity_id!(LoanTypeId);

#[cfg(test)]
mod tests {
    use super::{LeadId, LoanTypeId};
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn numeric_ids_become_text() -> Result<()> {
        let id: LeadId = serde_json::from_value(json!(1042))?;
        assert_eq!(id.as_str(), "1042");
        let id: LoanTypeId = serde_json::from_value(json!(" lt-7 "))?;
        assert_eq!(id.as_str(), "lt-7");
        assert_eq!(serde_json::to_value(LeadId::from("1042"))?, json!("1042"));
        Ok(())
    }

    #[test]
    fn blank_and_structured_ids_are_rejected() {
        assert!(serde_json::from_value::<LeadId>(json!("  ")).is_err());
        assert!(serde_json::from_value::<LeadId>(json!({"id": 1})).is_err());
        assert!(serde_json::from_value::<LeadId>(json!(1.5)).is_err());
    }
}
