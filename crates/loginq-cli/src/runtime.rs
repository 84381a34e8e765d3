// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use loginq_api::{ApiError, LeadListParams, LeadSource};
use loginq_app::{
    Clock, DEFAULT_AUTOSAVE_DELAY, FieldEdit, INITIAL_WINDOW, LeadField, LeadId, LeadQuery,
    LeadRecord, LeadView, LoanType, NavigatorCommand, NavigatorEvent, Pagination, PendingStatus,
    RecordStore, Scheduler, StatusCommit, StatusGroup, StatusNavigator, StatusTaxonomy,
    UserSummary, WINDOW_STEP, edit_body,
};
use loginq_cache::{CacheKey, CacheRegion, CacheStore, FetchPlan};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Decides whether the current user may change a lead's status.
pub type StatusPermission = Arc<dyn Fn(&LeadRecord) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub department: String,
    pub user_id: Option<String>,
    pub autosave_delay: Duration,
    pub page_size: usize,
    pub page_step: usize,
}

impl RuntimeSettings {
    pub fn for_department(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            user_id: None,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            page_size: INITIAL_WINDOW,
            page_step: WINDOW_STEP,
        }
    }
}

#[derive(Debug)]
enum Payload {
    Leads(Vec<LeadRecord>),
    Taxonomy(Vec<StatusGroup>),
    Users(Vec<UserSummary>),
    LoanTypes(Vec<LoanType>),
}

#[derive(Debug)]
enum WorkerEvent {
    Fetched {
        request_id: u64,
        region: CacheRegion,
        key: CacheKey,
        result: Result<Payload, ApiError>,
    },
    StatusSaved {
        request_id: u64,
        pending: PendingStatus,
        result: Result<Option<LeadRecord>, ApiError>,
    },
    FieldsSaved {
        lead_id: LeadId,
        fields: Vec<LeadField>,
        result: Result<Option<LeadRecord>, ApiError>,
    },
}

/// Owns the working set. Network calls run on worker threads and report
/// back over a channel; only `pump` applies their results, so every state
/// change happens on the caller's thread.
pub struct LeadRuntime {
    source: Arc<dyn LeadSource>,
    cache: CacheStore,
    settings: RuntimeSettings,
    lead_params: LeadListParams,
    records: RecordStore,
    taxonomy: StatusTaxonomy,
    users: Vec<UserSummary>,
    loan_types: Vec<LoanType>,
    query: LeadQuery,
    pagination: Pagination,
    navigator: StatusNavigator,
    edits: Scheduler<(LeadId, LeadField), FieldEdit>,
    can_edit_status: StatusPermission,
    tx: Sender<WorkerEvent>,
    rx: Receiver<WorkerEvent>,
    latest_fetch: HashMap<(CacheRegion, CacheKey), u64>,
    latest_commit: HashMap<LeadId, u64>,
    last_request_id: u64,
    in_flight: usize,
    last_error: Option<String>,
}

impl LeadRuntime {
    pub fn new(
        source: Arc<dyn LeadSource>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
        settings: RuntimeSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let lead_params = LeadListParams {
            user_id: settings.user_id.clone(),
            ..LeadListParams::for_department(settings.department.clone())
        };
        Self {
            source,
            cache,
            pagination: Pagination::new(settings.page_size, settings.page_step),
            settings,
            lead_params,
            records: RecordStore::default(),
            taxonomy: StatusTaxonomy::default(),
            users: Vec::new(),
            loan_types: Vec::new(),
            query: LeadQuery::default(),
            navigator: StatusNavigator::default(),
            edits: Scheduler::new(clock),
            can_edit_status: Arc::new(|_| true),
            tx,
            rx,
            latest_fetch: HashMap::new(),
            latest_commit: HashMap::new(),
            last_request_id: 0,
            in_flight: 0,
            last_error: None,
        }
    }

    pub fn set_status_permission(
        &mut self,
        allowed: impl Fn(&LeadRecord) -> bool + Send + Sync + 'static,
    ) {
        self.can_edit_status = Arc::new(allowed);
    }

    pub fn records(&self) -> &[LeadRecord] {
        self.records.records()
    }

    pub fn record(&self, id: &LeadId) -> Option<&LeadRecord> {
        self.records.get(id)
    }

    pub fn taxonomy(&self) -> &StatusTaxonomy {
        &self.taxonomy
    }

    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    pub fn loan_types(&self) -> &[LoanType] {
        &self.loan_types
    }

    pub fn navigator(&self) -> &StatusNavigator {
        &self.navigator
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn pending_edits(&self) -> usize {
        self.edits.len()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    pub fn lead_params(&self) -> &LeadListParams {
        &self.lead_params
    }

    /// Server-side list filters. Call `load(CacheRegion::LeadList, ..)`
    /// afterwards to fetch the new list.
    pub fn lead_params_mut(&mut self) -> &mut LeadListParams {
        &mut self.lead_params
    }

    pub fn query(&self) -> &LeadQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut LeadQuery {
        &mut self.query
    }

    pub fn set_query(&mut self, query: LeadQuery) {
        self.query = query;
    }

    pub fn show_more(&mut self) {
        self.pagination.show_more();
    }

    pub fn view(&mut self) -> LeadView<'_> {
        LeadView::build(self.records.records(), &self.query, &mut self.pagination)
    }

    pub fn lead_list_key(&self) -> CacheKey {
        self.key_for(CacheRegion::LeadList)
    }

    fn key_for(&self, region: CacheRegion) -> CacheKey {
        let department = self.lead_params.department.as_str();
        match region {
            CacheRegion::LeadList => {
                let pairs = self.lead_params.query_pairs();
                let dims: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(name, value)| (*name, value.as_str()))
                    .collect();
                CacheKey::for_subject(&format!("leads/{department}"), &dims)
            }
            CacheRegion::Users => CacheKey::for_subject("users", &[("department", department)]),
            CacheRegion::LoanTypes => CacheKey::for_subject("loan-types", &[]),
            CacheRegion::StatusTaxonomy => {
                CacheKey::for_subject("status-taxonomy", &[("department", department)])
            }
        }
    }

    pub fn load_all(&mut self, force_refresh: bool) -> Result<()> {
        for region in CacheRegion::ALL {
            self.load(region, force_refresh)?;
        }
        Ok(())
    }

    /// Serves whatever the cache can show right away, then fetches in the
    /// background unless the cached copy is still fresh.
    pub fn load(&mut self, region: CacheRegion, force_refresh: bool) -> Result<FetchPlan> {
        let key = self.key_for(region);
        if force_refresh {
            self.cache.invalidate(region, &key)?;
        }

        let (mut plan, cached) = match region {
            CacheRegion::LeadList => lookup(&self.cache, region, &key, Payload::Leads)?,
            CacheRegion::Users => lookup(&self.cache, region, &key, Payload::Users)?,
            CacheRegion::LoanTypes => lookup(&self.cache, region, &key, Payload::LoanTypes)?,
            CacheRegion::StatusTaxonomy => {
                lookup(&self.cache, region, &key, Payload::Taxonomy)?
            }
        };

        if let Some(payload) = cached
            && let Err(error) = self.apply_payload(payload)
        {
            tracing::warn!(region = region.as_str(), error = %error, "ignoring unusable cached data");
            plan = FetchPlan::FetchNow;
        }

        tracing::debug!(region = region.as_str(), ?plan, "load");
        if plan.needs_fetch() {
            self.dispatch_fetch(region, key);
        }
        Ok(plan)
    }

    fn dispatch_fetch(&mut self, region: CacheRegion, key: CacheKey) {
        let request_id = self.next_request_id();
        self.latest_fetch.insert((region, key.clone()), request_id);
        self.in_flight += 1;

        let source = Arc::clone(&self.source);
        let params = self.lead_params.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let department = params.department.as_str();
            let result = match region {
                CacheRegion::LeadList => source.fetch_leads(&params).map(Payload::Leads),
                CacheRegion::Users => source.fetch_users(Some(department)).map(Payload::Users),
                CacheRegion::LoanTypes => source.fetch_loan_types().map(Payload::LoanTypes),
                CacheRegion::StatusTaxonomy => source
                    .fetch_status_taxonomy(department)
                    .map(Payload::Taxonomy),
            };
            let _ = tx.send(WorkerEvent::Fetched {
                request_id,
                region,
                key,
                result,
            });
        });
    }

    fn refresh_lead_list(&mut self) -> Result<()> {
        let key = self.lead_list_key();
        self.cache.invalidate(CacheRegion::LeadList, &key)?;
        self.dispatch_fetch(CacheRegion::LeadList, key);
        Ok(())
    }

    fn next_request_id(&mut self) -> u64 {
        self.last_request_id = self.last_request_id.saturating_add(1);
        if self.last_request_id == 0 {
            self.last_request_id = 1;
        }
        self.last_request_id
    }

    /// Drives the status cell editor. Opening requires status permission;
    /// a commit is applied optimistically and sent to the backend.
    pub fn navigate(&mut self, command: NavigatorCommand) -> Result<Vec<NavigatorEvent>> {
        if let NavigatorCommand::Open(row) = &command {
            self.ensure_status_permission(row)?;
        }
        let events = self.navigator.dispatch(&self.taxonomy, command);
        for event in &events {
            if let NavigatorEvent::Committed(commit) = event {
                self.commit_status(commit.clone())?;
            }
        }
        Ok(events)
    }

    fn ensure_status_permission(&self, id: &LeadId) -> Result<()> {
        let record = self
            .records
            .get(id)
            .with_context(|| format!("lead {id} is not in the current list -- refresh and retry"))?;
        if !(self.can_edit_status)(record) {
            bail!("you cannot change the status of lead {id} -- ask your team leader");
        }
        Ok(())
    }

    pub fn commit_status(&mut self, commit: StatusCommit) -> Result<()> {
        self.ensure_status_permission(&commit.row)?;
        if !self.taxonomy.is_empty() && !self.taxonomy.has_main(&commit.status) {
            bail!(
                "unknown status {:?} -- refresh the status list and retry",
                commit.status
            );
        }

        let pending = self
            .records
            .apply_status(&commit.row, &commit.status, &commit.sub_status)?;
        let request_id = self.next_request_id();
        self.latest_commit.insert(commit.row.clone(), request_id);
        self.in_flight += 1;

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result =
                source.update_status(&pending.lead_id, &pending.status, &pending.sub_status);
            let _ = tx.send(WorkerEvent::StatusSaved {
                request_id,
                pending,
                result,
            });
        });
        Ok(())
    }

    /// Applies an edit locally and queues it for saving after the autosave
    /// delay. A zero delay saves straight away.
    pub fn edit_field(&mut self, edit: FieldEdit) -> Result<()> {
        edit.validate()?;
        self.records.apply_field_edit(&edit)?;
        let key = (edit.lead_id.clone(), edit.field);
        if let Some(edit) = self.edits.schedule(key, self.settings.autosave_delay, edit) {
            self.save_fields(edit.lead_id.clone(), vec![edit])?;
        }
        Ok(())
    }

    /// Focus left a field: save it now if it has a queued edit.
    pub fn blur_field(&mut self, lead_id: &LeadId, field: LeadField) -> Result<bool> {
        match self.edits.flush(&(lead_id.clone(), field)) {
            Some(edit) => {
                self.save_fields(lead_id.clone(), vec![edit])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn close_detail(&mut self) -> Result<usize> {
        let batch = self.edits.flush_all();
        let count = batch.len();
        self.save_batch(batch)?;
        Ok(count)
    }

    fn save_batch(&mut self, batch: Vec<((LeadId, LeadField), FieldEdit)>) -> Result<()> {
        let mut by_lead: BTreeMap<LeadId, Vec<FieldEdit>> = BTreeMap::new();
        for ((lead_id, _), edit) in batch {
            by_lead.entry(lead_id).or_default().push(edit);
        }
        for (lead_id, edits) in by_lead {
            self.save_fields(lead_id, edits)?;
        }
        Ok(())
    }

    fn save_fields(&mut self, lead_id: LeadId, edits: Vec<FieldEdit>) -> Result<()> {
        let body = edit_body(&edits)?;
        let fields: Vec<LeadField> = edits.iter().map(|edit| edit.field).collect();
        self.in_flight += 1;

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.update_lead_fields(&lead_id, &body);
            let _ = tx.send(WorkerEvent::FieldsSaved {
                lead_id,
                fields,
                result,
            });
        });
        Ok(())
    }

    /// Fires due edits and applies finished worker results. With `wait`,
    /// blocks up to that long for the first result when work is in flight.
    pub fn pump(&mut self, wait: Option<Duration>) -> Result<usize> {
        let due = self.edits.due();
        self.save_batch(due)?;

        let mut handled = 0;
        if let Some(wait) = wait
            && self.in_flight > 0
        {
            match self.rx.recv_timeout(wait) {
                Ok(event) => {
                    self.handle_event(event)?;
                    handled += 1;
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return Ok(handled);
                }
            }
        }
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    pub fn wait_idle(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline {
                bail!(
                    "{} request(s) still running after {}s -- the lead service is slow; retry shortly",
                    self.in_flight,
                    timeout.as_secs()
                );
            }
            self.pump(Some(deadline - now))?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerEvent) -> Result<()> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            WorkerEvent::Fetched {
                request_id,
                region,
                key,
                result,
            } => self.handle_fetched(request_id, region, key, result),
            WorkerEvent::StatusSaved {
                request_id,
                pending,
                result,
            } => self.handle_status_saved(request_id, &pending, result),
            WorkerEvent::FieldsSaved {
                lead_id,
                fields,
                result,
            } => {
                self.handle_fields_saved(&lead_id, &fields, result);
                Ok(())
            }
        }
    }

    fn handle_fetched(
        &mut self,
        request_id: u64,
        region: CacheRegion,
        key: CacheKey,
        result: Result<Payload, ApiError>,
    ) -> Result<()> {
        let latest = self.latest_fetch.get(&(region, key.clone())).copied();
        if latest != Some(request_id) {
            tracing::debug!(
                region = region.as_str(),
                request_id,
                ?latest,
                "discarding superseded response"
            );
            return Ok(());
        }
        self.latest_fetch.remove(&(region, key.clone()));
        let is_live = key == self.key_for(region);

        let payload = match result {
            Ok(payload) => payload,
            Err(error) if !is_live => {
                tracing::debug!(region = region.as_str(), %key, error = %error, "fetch for a previous key failed");
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(
                    region = region.as_str(),
                    timeout = error.is_timeout(),
                    error = %error,
                    "fetch failed; keeping current data"
                );
                self.last_error = Some(format!("load {region}: {error}"));
                return Ok(());
            }
        };

        match &payload {
            Payload::Leads(leads) => self.remember(region, &key, leads),
            Payload::Taxonomy(groups) => self.remember(region, &key, groups),
            Payload::Users(users) => self.remember(region, &key, users),
            Payload::LoanTypes(loan_types) => self.remember(region, &key, loan_types),
        }
        // Parameters moved on while this was in flight: keep it cached for
        // its own key but leave the live data alone.
        if !is_live {
            tracing::debug!(region = region.as_str(), %key, "cached response for a previous key");
            return Ok(());
        }
        if let Err(error) = self.apply_payload(payload) {
            tracing::warn!(region = region.as_str(), error = %error, "rejected fetched data");
            self.last_error = Some(format!("load {region}: {error:#}"));
            self.cache.invalidate(region, &key)?;
        }
        Ok(())
    }

    fn apply_payload(&mut self, payload: Payload) -> Result<()> {
        match payload {
            Payload::Leads(leads) => {
                self.records.replace_all(leads);
                // Edits still waiting for autosave win over the fetched copy.
                for edit in self.edits.payloads() {
                    if let Err(error) = self.records.apply_field_edit(edit) {
                        tracing::debug!(lead = %edit.lead_id, error = %error, "queued edit no longer applies");
                    }
                }
            }
            Payload::Taxonomy(groups) => self.taxonomy = StatusTaxonomy::new(groups)?,
            Payload::Users(users) => self.users = users,
            Payload::LoanTypes(loan_types) => self.loan_types = loan_types,
        }
        Ok(())
    }

    fn remember<T: Serialize + ?Sized>(&self, region: CacheRegion, key: &CacheKey, data: &T) {
        if let Err(error) = self.cache.put(region, key, data) {
            tracing::warn!(region = region.as_str(), error = %error, "cache write failed");
        }
    }

    fn handle_status_saved(
        &mut self,
        request_id: u64,
        pending: &PendingStatus,
        result: Result<Option<LeadRecord>, ApiError>,
    ) -> Result<()> {
        let is_latest = self.latest_commit.get(&pending.lead_id) == Some(&request_id);
        if is_latest {
            self.latest_commit.remove(&pending.lead_id);
        }

        match result {
            Ok(server_copy) => {
                tracing::info!(
                    lead = %pending.lead_id,
                    status = %pending.status,
                    sub_status = %pending.sub_status,
                    "status saved"
                );
                // Update responses may carry only a few fields, so take the
                // status pair and let the refetch bring the rest.
                if is_latest
                    && let Some(copy) = server_copy
                    && let Some(status) = copy.status()
                {
                    let sub_status = copy.sub_status().unwrap_or_default();
                    if let Err(error) = self.records.apply_status(&copy.id, status, sub_status) {
                        tracing::debug!(lead = %copy.id, error = %error, "server copy not applied");
                    }
                }
                self.refresh_lead_list()
            }
            Err(error) => {
                tracing::warn!(lead = %pending.lead_id, error = %error, "status save failed");
                if is_latest {
                    self.records.revert(pending);
                }
                self.last_error = Some(format!("save status for {}: {error}", pending.lead_id));
                Ok(())
            }
        }
    }

    fn handle_fields_saved(
        &mut self,
        lead_id: &LeadId,
        fields: &[LeadField],
        result: Result<Option<LeadRecord>, ApiError>,
    ) {
        let names: Vec<&str> = fields.iter().map(|field| field.as_str()).collect();
        match result {
            Ok(_) => {
                tracing::info!(lead = %lead_id, fields = ?names, "fields saved");
                let key = self.lead_list_key();
                if let Err(error) =
                    self.cache
                        .replace_payload(CacheRegion::LeadList, &key, self.records.records())
                {
                    tracing::warn!(lead = %lead_id, error = %error, "cache update after save failed");
                }
            }
            Err(error) => {
                tracing::warn!(lead = %lead_id, fields = ?names, error = %error, "field save failed");
                self.last_error = Some(format!("save {} for {lead_id}: {error}", names.join(", ")));
                let key = self.lead_list_key();
                self.dispatch_fetch(CacheRegion::LeadList, key);
            }
        }
    }
}

fn lookup<T: DeserializeOwned>(
    cache: &CacheStore,
    region: CacheRegion,
    key: &CacheKey,
    wrap: fn(T) -> Payload,
) -> Result<(FetchPlan, Option<Payload>)> {
    let hit = cache.get::<T>(region, key)?;
    let plan = FetchPlan::for_hit(hit.as_ref());
    Ok((plan, hit.map(|hit| wrap(hit.data))))
}
