// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};

use crate::edits::FieldEdit;
use crate::ids::LeadId;
use crate::model::LeadRecord;

/// Status pair a lead had before an optimistic change, kept so a failed
/// commit can be rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatus {
    pub lead_id: LeadId,
    pub previous_status: Option<String>,
    pub previous_sub_status: Option<String>,
    pub status: String,
    pub sub_status: String,
}

/// The in-memory lead collection. Order is the backend's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<LeadRecord>,
}

impl RecordStore {
    pub fn new(records: Vec<LeadRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[LeadRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn replace_all(&mut self, records: Vec<LeadRecord>) {
        self.records = records;
    }

    pub fn get(&self, id: &LeadId) -> Option<&LeadRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    fn get_mut(&mut self, id: &LeadId) -> Result<&mut LeadRecord> {
        self.records
            .iter_mut()
            .find(|record| &record.id == id)
            .with_context(|| format!("lead {id} is not in the current list -- refresh and retry"))
    }

    pub fn apply_status(
        &mut self,
        id: &LeadId,
        status: &str,
        sub_status: &str,
    ) -> Result<PendingStatus> {
        if status.trim().is_empty() {
            bail!("status is required -- pick a status and retry");
        }
        let record = self.get_mut(id)?;
        let pending = PendingStatus {
            lead_id: id.clone(),
            previous_status: record.status.take(),
            previous_sub_status: record.sub_status.take(),
            status: status.to_owned(),
            sub_status: sub_status.to_owned(),
        };
        record.status = Some(status.to_owned());
        record.sub_status = (!sub_status.trim().is_empty()).then(|| sub_status.to_owned());
        Ok(pending)
    }

    /// Restores the pre-commit pair. A record that vanished in the meantime
    /// (for example after a full refresh) is left alone.
    pub fn revert(&mut self, pending: &PendingStatus) -> bool {
        let Ok(record) = self.get_mut(&pending.lead_id) else {
            return false;
        };
        record.status = pending.previous_status.clone();
        record.sub_status = pending.previous_sub_status.clone();
        true
    }

    /// Replaces the record with the same id by the server's copy.
    pub fn reconcile(&mut self, fresh: LeadRecord) -> bool {
        match self.records.iter_mut().find(|record| record.id == fresh.id) {
            Some(slot) => {
                *slot = fresh;
                true
            }
            None => false,
        }
    }

    pub fn apply_field_edit(&mut self, edit: &FieldEdit) -> Result<()> {
        let record = self.get_mut(&edit.lead_id)?;
        edit.apply_to(record)
    }
}

#[cfg(test)]
mod tests {
    use super::RecordStore;
    use crate::{FieldEdit, LeadField, LeadId, LeadRecord};
    use anyhow::Result;

    fn store() -> RecordStore {
        let mut first = LeadRecord::blank("L1");
        first.status = Some("ACTIVE".to_owned());
        first.sub_status = Some("NEW".to_owned());
        RecordStore::new(vec![first, LeadRecord::blank("L2")])
    }

    #[test]
    fn apply_then_revert_restores_previous_pair() -> Result<()> {
        let mut store = store();
        let id = LeadId::from("L1");
        let pending = store.apply_status(&id, "REJECT", "CIBIL LOW")?;
        assert_eq!(store.get(&id).and_then(LeadRecord::status), Some("REJECT"));

        assert!(store.revert(&pending));
        let record = store.get(&id).expect("lead should exist");
        assert_eq!(record.status(), Some("ACTIVE"));
        assert_eq!(record.sub_status(), Some("NEW"));
        Ok(())
    }

    #[test]
    fn apply_status_on_unknown_lead_fails_without_change() {
        let mut store = store();
        let before = store.clone();
        let error = store
            .apply_status(&LeadId::from("missing"), "APPROVE", "APPROVE")
            .expect_err("unknown lead should fail");
        assert!(error.to_string().contains("not in the current list"));
        assert_eq!(store, before);
    }

    #[test]
    fn reconcile_replaces_by_id_only() {
        let mut store = store();
        let mut fresh = LeadRecord::blank("L2");
        fresh.status = Some("APPROVE".to_owned());
        assert!(store.reconcile(fresh));
        assert!(!store.reconcile(LeadRecord::blank("L9")));
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&LeadId::from("L2")).and_then(LeadRecord::status),
            Some("APPROVE")
        );
    }

    #[test]
    fn field_edit_lands_on_the_record() -> Result<()> {
        let mut store = store();
        store.apply_field_edit(&FieldEdit::new("L2", LeadField::City, "Nagpur"))?;
        let record = store.get(&LeadId::from("L2")).expect("lead should exist");
        assert_eq!(record.extra.get("city").and_then(|v| v.as_str()), Some("Nagpur"));
        Ok(())
    }
}
