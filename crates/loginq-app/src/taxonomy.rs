// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::HashMap;

use crate::model::StatusGroup;

/// Two-level status hierarchy with a reverse index from sub-status to main.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusTaxonomy {
    groups: Vec<StatusGroup>,
    main_of: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyEntry {
    Main(String),
    Sub { main: String, sub: String },
}

impl TaxonomyEntry {
    pub fn label(&self) -> &str {
        match self {
            Self::Main(main) => main,
            Self::Sub { sub, .. } => sub,
        }
    }
}

impl StatusTaxonomy {
    pub fn new(groups: Vec<StatusGroup>) -> Result<Self> {
        let mut main_of: HashMap<String, String> = HashMap::new();
        let mut seen_mains: Vec<&str> = Vec::with_capacity(groups.len());
        for group in &groups {
            if seen_mains.contains(&group.name.as_str()) {
                bail!("status taxonomy lists main status {:?} twice", group.name);
            }
            seen_mains.push(&group.name);

            for sub in &group.sub_statuses {
                if let Some(existing) = main_of.get(sub)
                    && existing != &group.name
                {
                    bail!(
                        "sub-status {sub:?} is listed under both {existing:?} and {:?}; fix the taxonomy for this department",
                        group.name
                    );
                }
                main_of.insert(sub.clone(), group.name.clone());
            }
        }
        Ok(Self { groups, main_of })
    }

    pub fn groups(&self) -> &[StatusGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn main_statuses(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.name.as_str())
    }

    pub fn sub_statuses(&self, main: &str) -> &[String] {
        self.groups
            .iter()
            .find(|group| group.name == main)
            .map(|group| group.sub_statuses.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_main(&self, main: &str) -> bool {
        self.groups.iter().any(|group| group.name == main)
    }

    pub fn main_status_of(&self, sub: &str) -> Option<&str> {
        self.main_of.get(sub).map(String::as_str)
    }

    /// Sub-status shown for a lead whose sub-status may be missing.
    ///
    /// An explicit sub-status wins. A status that is itself a known
    /// sub-status is reported as the sub-status. A main status without any
    /// sub-statuses doubles as its own sub-status.
    pub fn effective_sub_status<'a>(
        &self,
        status: Option<&'a str>,
        sub_status: Option<&'a str>,
    ) -> Option<&'a str> {
        if let Some(sub) = sub_status.filter(|sub| !sub.trim().is_empty()) {
            return Some(sub);
        }
        let status = status.filter(|status| !status.trim().is_empty())?;
        if self.main_of.contains_key(status) {
            return Some(status);
        }
        if self.has_main(status) && self.sub_statuses(status).is_empty() {
            return Some(status);
        }
        None
    }

    /// Every main and sub entry containing `term`, exact matches first.
    pub fn search(&self, term: &str) -> Vec<TaxonomyEntry> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for group in &self.groups {
            let entries = std::iter::once(TaxonomyEntry::Main(group.name.clone())).chain(
                group.sub_statuses.iter().map(|sub| TaxonomyEntry::Sub {
                    main: group.name.clone(),
                    sub: sub.clone(),
                }),
            );
            for entry in entries {
                let label = entry.label().to_lowercase();
                if label == needle {
                    exact.push(entry);
                } else if label.contains(&needle) {
                    partial.push(entry);
                }
            }
        }
        exact.extend(partial);
        exact
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusTaxonomy, TaxonomyEntry};
    use crate::StatusGroup;
    use anyhow::Result;

    fn group(name: &str, subs: &[&str]) -> StatusGroup {
        StatusGroup {
            name: name.to_owned(),
            sub_statuses: subs.iter().map(|sub| (*sub).to_owned()).collect(),
        }
    }

    fn sample() -> Result<StatusTaxonomy> {
        StatusTaxonomy::new(vec![
            group("ACTIVE", &["NEW", "SENT"]),
            group("APPROVE", &[]),
            group("REJECT", &["CIBIL LOW", "NEW ADDRESS MISMATCH"]),
        ])
    }

    #[test]
    fn reverse_index_maps_every_sub_to_its_main() -> Result<()> {
        let taxonomy = sample()?;
        assert_eq!(taxonomy.main_status_of("NEW"), Some("ACTIVE"));
        assert_eq!(taxonomy.main_status_of("SENT"), Some("ACTIVE"));
        assert_eq!(taxonomy.main_status_of("APPROVE"), None);
        assert!(taxonomy.sub_statuses("APPROVE").is_empty());
        Ok(())
    }

    #[test]
    fn aliased_sub_status_is_rejected() {
        let error = StatusTaxonomy::new(vec![group("A", &["X"]), group("B", &["X"])])
            .expect_err("aliasing should fail");
        assert!(error.to_string().contains("listed under both"));
    }

    #[test]
    fn search_ranks_exact_before_partial() -> Result<()> {
        let taxonomy = sample()?;
        let results = taxonomy.search("new");
        assert_eq!(
            results,
            vec![
                TaxonomyEntry::Sub {
                    main: "ACTIVE".to_owned(),
                    sub: "NEW".to_owned()
                },
                TaxonomyEntry::Sub {
                    main: "REJECT".to_owned(),
                    sub: "NEW ADDRESS MISMATCH".to_owned()
                },
            ]
        );
        assert!(taxonomy.search("   ").is_empty());
        Ok(())
    }

    #[test]
    fn effective_sub_status_fallbacks() -> Result<()> {
        let taxonomy = sample()?;
        assert_eq!(
            taxonomy.effective_sub_status(Some("ACTIVE"), Some("SENT")),
            Some("SENT")
        );
        assert_eq!(taxonomy.effective_sub_status(Some("NEW"), None), Some("NEW"));
        assert_eq!(
            taxonomy.effective_sub_status(Some("APPROVE"), Some("")),
            Some("APPROVE")
        );
        assert_eq!(taxonomy.effective_sub_status(Some("ACTIVE"), None), None);
        assert_eq!(taxonomy.effective_sub_status(None, None), None);
        Ok(())
    }
}
