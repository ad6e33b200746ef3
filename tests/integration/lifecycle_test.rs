// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::{build_core, harness};
use crawlkeep::config::settings::LifecycleSettings;
use crawlkeep::domain::models::crawl_job::CrawlJobStatus;
use crawlkeep::domain::models::session::{AccessTier, SessionContext};
use crawlkeep::domain::services::lifecycle_service::StatusCursor;
use crawlkeep::engines::traits::CrawlEngine;
use crawlkeep::workers::manager::LifecycleSupervisor;
use std::collections::HashSet;
use uuid::Uuid;

fn registered(session_id: &str, owner: Uuid) -> SessionContext {
    SessionContext::new(session_id, Some(owner), AccessTier::Registered)
}

#[tokio::test]
async fn test_drain_then_resume_across_restart() {
    let owner = Uuid::new_v4();
    let first = harness().await;

    // A registered session starts a crawl and makes some progress
    let handle = first
        .service
        .get_or_create("s1", Some(owner), AccessTier::Registered)
        .unwrap();
    let ack = handle.engine.start("https://example.com").await.unwrap();
    let job_id = ack.job_id.unwrap();

    first
        .factory
        .engine_for("s1")
        .seed_results(120, 340, vec!["https://example.com/frontier".to_string()]);

    // Graceful shutdown checkpoints the working set and pauses the job
    let report = first.service.drain_all().await;
    assert_eq!(report.flushed, 1);
    assert!(report.errors.is_empty());

    let job = first.store.read_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, CrawlJobStatus::Paused);
    assert_eq!(job.crawled_count, 120);
    assert!(job.last_checkpoint_at.is_some());

    // "Restart": new registry and engines over the surviving store
    let second = build_core(first.db.clone(), HashSet::new());
    let recovered = second.store.fail_interrupted_jobs().await.unwrap();
    assert_eq!(recovered, 0, "a drained job must not look crashed");

    // Resume from the durable crawl id in a brand-new session
    let ack = second
        .service
        .resume_job(job_id, &registered("s2", owner))
        .await
        .unwrap();
    assert!(ack.ok);

    let engine = second.factory.engine_for("s2");
    assert!(engine.is_running());
    assert_eq!(engine.current_job_id(), Some(job_id));

    // Counts reflect exactly what was persisted, the dedup index is rebuilt,
    // and the frontier cursor came back
    let counts = engine.counts();
    assert_eq!(counts.crawled, 120);
    assert_eq!(counts.discovered, 120);
    assert_eq!(engine.link_key_count(), 340);
    assert_eq!(engine.frontier(), vec!["https://example.com/frontier"]);

    let status = engine.status().await;
    assert_eq!(status.urls.len(), 120);
    assert_eq!(status.links.len(), 340);

    let job = second.store.read_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, CrawlJobStatus::Running);
}

#[tokio::test]
async fn test_drain_survives_failure_in_the_middle() {
    let db = crate::helpers::setup_db().await;
    // Session s2's engine refuses to flush
    let core = build_core(db, HashSet::from(["s2".to_string()]));

    let mut job_ids = Vec::new();
    for session in ["s1", "s2", "s3"] {
        let handle = core
            .service
            .get_or_create(session, None, AccessTier::Admin)
            .unwrap();
        let ack = handle.engine.start("https://example.com").await.unwrap();
        job_ids.push(ack.job_id.unwrap());
        core.factory.engine_for(session).seed_results(5, 5, vec![]);
    }

    let report = core.service.drain_all().await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.flushed, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "s2");

    // The failing session's job stays running in the store; the others pause
    let statuses = {
        let mut statuses = Vec::new();
        for job_id in &job_ids {
            statuses.push(core.store.read_job(*job_id).await.unwrap().unwrap().status);
        }
        statuses
    };
    assert_eq!(statuses[0], CrawlJobStatus::Paused);
    assert_eq!(statuses[1], CrawlJobStatus::Running);
    assert_eq!(statuses[2], CrawlJobStatus::Paused);
}

#[tokio::test]
async fn test_readonly_load_returns_full_dataset_once() {
    let owner = Uuid::new_v4();
    let core = harness().await;

    // Produce a finished, persisted crawl
    let handle = core
        .service
        .get_or_create("s1", Some(owner), AccessTier::Registered)
        .unwrap();
    let ack = handle.engine.start("https://example.com").await.unwrap();
    let job_id = ack.job_id.unwrap();
    core.factory
        .engine_for("s1")
        .seed_results(30, 12, vec![]);
    core.factory.engine_for("s1").force_flush().await.unwrap();
    handle.engine.stop().await.unwrap();
    core.store
        .set_status(job_id, CrawlJobStatus::Completed)
        .await
        .unwrap();
    core.service.remove("s1");

    // Load it read-only into a fresh session
    let ctx = registered("s9", owner);
    let summary = core.service.load_job_readonly(job_id, &ctx).await.unwrap();
    assert_eq!(summary.urls, 30);
    assert_eq!(summary.links, 12);

    // Status is untouched and the engine is not running
    let job = core.store.read_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, CrawlJobStatus::Completed);
    assert!(!core.factory.engine_for("s9").is_running());

    // First poll ignores the cursor: without this a completed crawl would
    // look empty forever, since no new increments will ever arrive
    let cursor = StatusCursor {
        url_since: Some(30),
        link_since: Some(12),
        issue_since: Some(0),
    };
    let page = core.service.poll_status(&ctx, cursor).await.unwrap();
    assert!(page.full_refresh);
    assert_eq!(page.urls.len(), 30);
    assert_eq!(page.links.len(), 12);

    // Second poll honours the cursor again
    let page = core.service.poll_status(&ctx, cursor).await.unwrap();
    assert!(!page.full_refresh);
    assert!(page.urls.is_empty());
}

#[tokio::test]
async fn test_resume_rejects_foreign_and_unknown_jobs() {
    let owner = Uuid::new_v4();
    let core = harness().await;

    let handle = core
        .service
        .get_or_create("s1", Some(owner), AccessTier::Registered)
        .unwrap();
    let ack = handle.engine.start("https://example.com").await.unwrap();
    let job_id = ack.job_id.unwrap();
    core.service.drain_all().await;

    let fresh = build_core(core.db.clone(), HashSet::new());

    // Unknown job id
    let err = fresh
        .service
        .resume_job(Uuid::new_v4(), &registered("s2", owner))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("未找到"));

    // Wrong owner
    let err = fresh
        .service
        .resume_job(job_id, &registered("s2", Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "未授权访问该作业");
}

#[tokio::test]
async fn test_supervisor_shutdown_drains_and_blocks_new_sessions() {
    let core = harness().await;

    let handle = core
        .service
        .get_or_create("s1", None, AccessTier::Admin)
        .unwrap();
    let ack = handle.engine.start("https://example.com").await.unwrap();
    let job_id = ack.job_id.unwrap();
    core.factory.engine_for("s1").seed_results(3, 3, vec![]);

    let mut supervisor = LifecycleSupervisor::new(
        core.service.clone(),
        LifecycleSettings {
            cleanup_interval_secs: 1,
            idle_timeout_secs: 3600,
            engine_stop_timeout_secs: 2,
            drain_entry_timeout_secs: 2,
        },
    );
    supervisor.start();

    let report = supervisor.shutdown().await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.flushed, 1);

    // After shutdown the job is paused and the registry refuses newcomers
    let job = core.store.read_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, CrawlJobStatus::Paused);
    assert!(core
        .service
        .get_or_create("s2", None, AccessTier::Guest)
        .is_err());
}
