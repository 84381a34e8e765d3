// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use loginq_app::{Clock, LeadRecord, ManualClock};
use loginq_cache::{CacheKey, CacheRegion, CacheStore, FetchPlan, FreshnessPolicy};
use loginq_testkit::{LeadFaker, fixture_now, temp_cache_path};
use std::sync::Arc;
use std::time::Duration;

fn memory_store() -> Result<(ManualClock, CacheStore)> {
    let clock = ManualClock::new(fixture_now());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = CacheStore::open_memory(shared)?;
    store.bootstrap()?;
    Ok((clock, store))
}

fn lead_key() -> CacheKey {
    CacheKey::for_subject("leads/login", &[("user_id", "u-1"), ("status", "all")])
}

#[test]
fn entry_within_skip_is_served_without_refetch() -> Result<()> {
    let (clock, store) = memory_store()?;
    let leads = LeadFaker::new(1).leads(5)?;
    store.put(CacheRegion::LeadList, &lead_key(), &leads)?;

    clock.advance(time::Duration::seconds(20));
    let hit = store
        .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?
        .expect("entry should be showable");
    assert_eq!(hit.data, leads);
    assert!(!hit.is_stale);
    assert_eq!(hit.age, Duration::from_secs(20));
    assert_eq!(FetchPlan::for_hit(Some(&hit)), FetchPlan::ServeCached);
    Ok(())
}

#[test]
fn entry_past_skip_is_served_and_revalidated() -> Result<()> {
    let (clock, store) = memory_store()?;
    let leads = LeadFaker::new(2).leads(3)?;
    store.put(CacheRegion::LeadList, &lead_key(), &leads)?;

    clock.advance(time::Duration::seconds(40));
    let hit = store
        .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?
        .expect("entry should still be showable");
    assert_eq!(hit.data.len(), 3);
    assert!(hit.is_stale);
    assert_eq!(FetchPlan::for_hit(Some(&hit)), FetchPlan::ServeAndRevalidate);
    Ok(())
}

#[test]
fn entry_past_show_is_a_miss() -> Result<()> {
    let (clock, store) = memory_store()?;
    store.put(CacheRegion::LeadList, &lead_key(), &Vec::<LeadRecord>::new())?;

    clock.advance(time::Duration::seconds(300));
    let hit = store.get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?;
    assert!(hit.is_none());
    assert_eq!(FetchPlan::for_hit(hit.as_ref()), FetchPlan::FetchNow);
    Ok(())
}

#[test]
fn malformed_payload_is_a_miss() -> Result<()> {
    let (_clock, store) = memory_store()?;
    store.put(CacheRegion::LeadList, &lead_key(), &"not a lead list")?;
    let hit = store.get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?;
    assert!(hit.is_none());
    Ok(())
}

#[test]
fn regions_are_independent_namespaces() -> Result<()> {
    let (_clock, store) = memory_store()?;
    let key = CacheKey::from("shared");
    store.put(CacheRegion::Users, &key, &vec!["a"])?;
    store.put(CacheRegion::LoanTypes, &key, &vec!["b"])?;
    store.put(CacheRegion::LoanTypes, &CacheKey::from("other"), &vec!["c"])?;

    assert_eq!(store.invalidate_region(CacheRegion::LoanTypes)?, 2);
    let users = store.get::<Vec<String>>(CacheRegion::Users, &key)?;
    assert_eq!(users.map(|hit| hit.data), Some(vec!["a".to_owned()]));
    assert!(store.get::<Vec<String>>(CacheRegion::LoanTypes, &key)?.is_none());
    Ok(())
}

#[test]
fn invalidate_forces_a_miss() -> Result<()> {
    let (_clock, store) = memory_store()?;
    store.put(CacheRegion::StatusTaxonomy, &CacheKey::from("login"), &vec![1, 2])?;
    assert!(store.invalidate(CacheRegion::StatusTaxonomy, &CacheKey::from("login"))?);
    assert!(!store.invalidate(CacheRegion::StatusTaxonomy, &CacheKey::from("login"))?);
    assert!(
        store
            .get::<Vec<i32>>(CacheRegion::StatusTaxonomy, &CacheKey::from("login"))?
            .is_none()
    );
    Ok(())
}

#[test]
fn purge_uses_each_regions_show_threshold() -> Result<()> {
    let (clock, store) = memory_store()?;
    store.put(CacheRegion::LeadList, &lead_key(), &Vec::<LeadRecord>::new())?;
    store.put(CacheRegion::Users, &CacheKey::from("login"), &Vec::<String>::new())?;

    clock.advance(time::Duration::seconds(301));
    assert_eq!(store.purge_expired()?, 1);
    assert_eq!(store.entry_count()?, 1);

    clock.advance(time::Duration::seconds(600));
    assert_eq!(store.purge_expired()?, 1);
    assert_eq!(store.entry_count()?, 0);
    Ok(())
}

#[test]
fn configured_policy_overrides_default() -> Result<()> {
    let (clock, mut store) = memory_store()?;
    store.set_policy(
        CacheRegion::LeadList,
        FreshnessPolicy::new(Duration::from_secs(60), Duration::from_secs(5))?,
    );
    store.put(CacheRegion::LeadList, &lead_key(), &Vec::<LeadRecord>::new())?;

    clock.advance(time::Duration::seconds(10));
    let hit = store.get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?;
    assert!(hit.is_some_and(|hit| hit.is_stale));

    clock.advance(time::Duration::seconds(50));
    assert!(
        store
            .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?
            .is_none()
    );
    Ok(())
}

#[test]
fn file_backed_cache_survives_reopen() -> Result<()> {
    let (_dir, path) = temp_cache_path()?;
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(fixture_now()));
    let leads = LeadFaker::new(3).leads(4)?;
    {
        let store = CacheStore::open(&path, Arc::clone(&clock))?;
        store.bootstrap()?;
        store.put(CacheRegion::LeadList, &lead_key(), &leads)?;
    }

    let reopened = CacheStore::open(&path, clock)?;
    reopened.bootstrap()?;
    let hit = reopened
        .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?
        .expect("entry should persist");
    assert_eq!(hit.data, leads);
    Ok(())
}

#[test]
fn replacing_payload_keeps_fetch_time() -> Result<()> {
    let (clock, store) = memory_store()?;
    let leads = LeadFaker::new(4).leads(3)?;
    store.put(CacheRegion::LeadList, &lead_key(), &leads)?;

    clock.advance(time::Duration::seconds(100));
    assert!(store.replace_payload(CacheRegion::LeadList, &lead_key(), &leads[..1])?);
    let hit = store
        .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &lead_key())?
        .expect("entry should still be showable");
    assert_eq!(hit.data.len(), 1);
    assert_eq!(hit.age, Duration::from_secs(100));
    assert!(hit.is_stale);

    let missing = CacheKey::for_subject("leads/login", &[("status", "none")]);
    assert!(!store.replace_payload(CacheRegion::LeadList, &missing, &leads)?);
    assert!(
        store
            .get::<Vec<LeadRecord>>(CacheRegion::LeadList, &missing)?
            .is_none()
    );
    Ok(())
}
