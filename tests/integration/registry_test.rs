// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::harness;
use chrono::{Duration, Utc};
use crawlkeep::domain::models::session::AccessTier;
use crawlkeep::engines::traits::CrawlEngine;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_first_access_constructs_one_engine() {
    let core = harness().await;
    let service = core.service.clone();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .get_or_create("shared-session", None, AccessTier::Guest)
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(core.factory.construction_count(), 1);
    assert_eq!(core.service.registry().len(), 1);

    // Both callers see the same engine
    let a = core
        .service
        .get_or_create("shared-session", None, AccessTier::Guest)
        .unwrap();
    let b = core
        .service
        .get_or_create("shared-session", None, AccessTier::Guest)
        .unwrap();
    assert!(Arc::ptr_eq(&a.engine, &b.engine));
}

#[tokio::test]
async fn test_sweep_evicts_only_past_threshold() {
    let core = harness().await;

    core.service
        .get_or_create("s1", None, AccessTier::Guest)
        .unwrap();

    // 59 minutes idle under a 60 minute threshold: stays
    let removed = core
        .service
        .evict_idle_at(Utc::now() + Duration::minutes(59))
        .await;
    assert_eq!(removed, 0);
    assert_eq!(core.service.registry().len(), 1);

    // 61 minutes idle: gone after one sweep
    let removed = core
        .service
        .evict_idle_at(Utc::now() + Duration::minutes(61))
        .await;
    assert_eq!(removed, 1);
    assert!(core
        .service
        .registry()
        .snapshot()
        .iter()
        .all(|(id, _, _)| id != "s1"));
}

#[tokio::test]
async fn test_eviction_stops_running_crawl_first() {
    let core = harness().await;

    let handle = core
        .service
        .get_or_create("s1", None, AccessTier::Admin)
        .unwrap();
    handle.engine.start("https://example.com").await.unwrap();
    let engine = core.factory.engine_for("s1");
    assert!(engine.is_running());

    let removed = core
        .service
        .evict_idle_at(Utc::now() + Duration::minutes(61))
        .await;

    assert_eq!(removed, 1);
    assert!(!engine.is_running());
    assert!(core.service.registry().is_empty());
}

#[tokio::test]
async fn test_remove_returns_ownership_and_is_idempotent() {
    let core = harness().await;

    core.service
        .get_or_create("s1", None, AccessTier::Guest)
        .unwrap();

    let detached = core.service.remove("s1");
    assert!(detached.is_some());
    assert!(core.service.remove("s1").is_none());

    // The detached handle still works; the registry no longer knows it
    let handle = detached.unwrap();
    assert!(!handle.engine.is_running());
    assert!(core.service.registry().is_empty());
}
