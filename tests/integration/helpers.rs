// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use crawlkeep::config::settings::LifecycleSettings;
use crawlkeep::domain::models::crawl_job::{CrawlJob, CrawlJobStatus};
use crawlkeep::domain::models::records::{
    CheckpointSnapshot, CrawlCounts, IssueRecord, LinkRecord, UrlRecord,
};
use crawlkeep::domain::models::session::{SessionContext, SessionSettings};
use crawlkeep::domain::repositories::checkpoint_repository::CheckpointRepository;
use crawlkeep::domain::services::lifecycle_service::LifecycleService;
use crawlkeep::engines::traits::{
    CrawlEngine, EngineAck, EngineError, EngineFactory, EngineState, EngineStatus,
};
use crawlkeep::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use crawlkeep::registry::session_registry::SessionRegistry;
use crawlkeep::utils::url_utils::resolve_base_domain;
use migration::{Migrator, MigratorTrait};
use parking_lot::Mutex;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Mutable working set of a fake engine
#[derive(Default)]
struct EngineInner {
    running: bool,
    job_id: Option<Uuid>,
    urls: Vec<UrlRecord>,
    links: Vec<LinkRecord>,
    issues: Vec<IssueRecord>,
    link_keys: HashSet<String>,
    counts: CrawlCounts,
    frontier: Vec<String>,
}

/// Test double for the opaque crawl engine collaborator.
///
/// Behaves like the real thing from the lifecycle core's point of view:
/// keeps result buffers behind its own lock, writes checkpoints through the
/// store on flush, and rebuilds its working set from a snapshot on hydrate.
pub struct FakeEngine {
    store: Arc<dyn CheckpointRepository>,
    owner_id: Option<Uuid>,
    persistence: bool,
    fail_flush: bool,
    inner: Mutex<EngineInner>,
}

impl FakeEngine {
    fn new(
        store: Arc<dyn CheckpointRepository>,
        owner_id: Option<Uuid>,
        persistence: bool,
        fail_flush: bool,
    ) -> Self {
        Self {
            store,
            owner_id,
            persistence,
            fail_flush,
            inner: Mutex::new(EngineInner::default()),
        }
    }

    /// Push crawl results into the working set, as continued crawling would
    pub fn seed_results(&self, urls: usize, links: usize, frontier: Vec<String>) {
        let mut inner = self.inner.lock();
        for i in 0..urls {
            inner.urls.push(UrlRecord {
                url: format!("https://example.com/page{}", i),
                status_code: Some(200),
                title: Some(format!("Page {}", i)),
                content_type: Some("text/html".to_string()),
                depth: 1,
                response_time_ms: Some(25),
            });
        }
        for i in 0..links {
            let link = LinkRecord {
                source_url: "https://example.com/".to_string(),
                target_url: format!("https://example.com/page{}", i),
                anchor_text: None,
                is_internal: true,
            };
            inner.link_keys.insert(link.dedup_key());
            inner.links.push(link);
        }
        inner.counts = CrawlCounts {
            discovered: inner.urls.len() as i32,
            crawled: inner.urls.len() as i32,
        };
        inner.frontier = frontier;
    }

    pub fn link_key_count(&self) -> usize {
        self.inner.lock().link_keys.len()
    }

    pub fn counts(&self) -> CrawlCounts {
        self.inner.lock().counts
    }

    pub fn frontier(&self) -> Vec<String> {
        self.inner.lock().frontier.clone()
    }
}

#[async_trait]
impl CrawlEngine for FakeEngine {
    async fn start(&self, seed_url: &str) -> Result<EngineAck, EngineError> {
        let job_id = Uuid::new_v4();
        let base_domain = resolve_base_domain(seed_url)
            .map_err(|e| EngineError::Other(e.to_string()))?;
        let now = Utc::now();

        let job = CrawlJob {
            id: job_id,
            owner_id: self.owner_id,
            seed_url: seed_url.to_string(),
            base_domain,
            status: CrawlJobStatus::Running,
            config: serde_json::json!({}),
            discovered_count: 0,
            crawled_count: 0,
            created_at: now,
            updated_at: now,
            last_checkpoint_at: None,
        };
        self.store
            .write_job(&job)
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?;

        let mut inner = self.inner.lock();
        *inner = EngineInner::default();
        inner.job_id = Some(job_id);
        inner.running = true;

        Ok(EngineAck::ok("Crawl started", Some(job_id)))
    }

    async fn stop(&self) -> Result<EngineAck, EngineError> {
        self.inner.lock().running = false;
        Ok(EngineAck::ok("Crawl stopped", None))
    }

    async fn pause(&self) -> Result<EngineAck, EngineError> {
        self.inner.lock().running = false;
        Ok(EngineAck::ok("Crawl paused", None))
    }

    async fn resume(&self) -> Result<EngineAck, EngineError> {
        let mut inner = self.inner.lock();
        if inner.job_id.is_none() {
            return Ok(EngineAck::rejected("No crawl to resume"));
        }
        inner.running = true;
        Ok(EngineAck::ok("Crawl resumed", inner.job_id))
    }

    async fn status(&self) -> EngineStatus {
        let inner = self.inner.lock();
        EngineStatus {
            job_id: inner.job_id,
            state: if inner.running {
                EngineState::Running
            } else {
                EngineState::Idle
            },
            counts: inner.counts,
            urls: inner.urls.clone(),
            links: inner.links.clone(),
            issues: inner.issues.clone(),
        }
    }

    async fn force_flush(&self) -> Result<(), EngineError> {
        if self.fail_flush {
            return Err(EngineError::FlushFailed("simulated disk failure".to_string()));
        }

        let (job_id, urls, links, issues, counts) = {
            let inner = self.inner.lock();
            let job_id = inner
                .job_id
                .ok_or_else(|| EngineError::Other("no active job".to_string()))?;
            (
                job_id,
                inner.urls.clone(),
                inner.links.clone(),
                inner.issues.clone(),
                inner.counts,
            )
        };

        self.store
            .replace_urls(job_id, &urls)
            .await
            .map_err(|e| EngineError::FlushFailed(e.to_string()))?;
        self.store
            .replace_links(job_id, &links)
            .await
            .map_err(|e| EngineError::FlushFailed(e.to_string()))?;
        self.store
            .replace_issues(job_id, &issues)
            .await
            .map_err(|e| EngineError::FlushFailed(e.to_string()))?;

        if let Some(mut job) = self
            .store
            .read_job(job_id)
            .await
            .map_err(|e| EngineError::FlushFailed(e.to_string()))?
        {
            job.discovered_count = counts.discovered;
            job.crawled_count = counts.crawled;
            job.last_checkpoint_at = Some(Utc::now());
            job.updated_at = Utc::now();
            self.store
                .write_job(&job)
                .await
                .map_err(|e| EngineError::FlushFailed(e.to_string()))?;
        }

        Ok(())
    }

    async fn write_resume_cursor(&self) -> Result<(), EngineError> {
        let (job_id, frontier) = {
            let inner = self.inner.lock();
            let job_id = inner
                .job_id
                .ok_or_else(|| EngineError::Other("no active job".to_string()))?;
            (job_id, inner.frontier.clone())
        };

        self.store
            .write_queue_checkpoint(job_id, serde_json::json!({ "frontier": frontier }))
            .await
            .map_err(|e| EngineError::FlushFailed(e.to_string()))
    }

    async fn hydrate(&self, snapshot: CheckpointSnapshot) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();

        inner.job_id = Some(snapshot.job.id);
        inner.counts = snapshot.counts();
        inner.link_keys = snapshot.link_keys();
        inner.frontier = snapshot
            .cursor
            .as_ref()
            .and_then(|c| c.payload.get("frontier"))
            .and_then(|f| serde_json::from_value(f.clone()).ok())
            .unwrap_or_default();
        inner.urls = snapshot.urls;
        inner.links = snapshot.links;
        inner.issues = snapshot.issues;
        inner.running = false;

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    fn current_job_id(&self) -> Option<Uuid> {
        self.inner.lock().job_id
    }

    fn persistence_enabled(&self) -> bool {
        self.persistence
    }
}

/// Factory that builds FakeEngines against the shared store and keeps
/// handles for later inspection
pub struct FakeEngineFactory {
    store: Arc<dyn CheckpointRepository>,
    constructions: AtomicUsize,
    engines: Mutex<HashMap<String, Arc<FakeEngine>>>,
    fail_flush_sessions: HashSet<String>,
}

impl FakeEngineFactory {
    pub fn with_failing_sessions(
        store: Arc<dyn CheckpointRepository>,
        fail_flush_sessions: HashSet<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            constructions: AtomicUsize::new(0),
            engines: Mutex::new(HashMap::new()),
            fail_flush_sessions,
        })
    }

    pub fn engine_for(&self, session_id: &str) -> Arc<FakeEngine> {
        self.engines
            .lock()
            .get(session_id)
            .expect("no engine constructed for session")
            .clone()
    }

    pub fn construction_count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self, ctx: &SessionContext, settings: &SessionSettings) -> Arc<dyn CrawlEngine> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::new(FakeEngine::new(
            self.store.clone(),
            ctx.owner_id,
            settings.persistence_enabled,
            self.fail_flush_sessions.contains(&ctx.session_id),
        ));
        self.engines
            .lock()
            .insert(ctx.session_id.clone(), engine.clone());
        engine
    }
}

pub async fn setup_db() -> Arc<DatabaseConnection> {
    // Single connection: every query must see the same in-memory database
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1);
    let db = Database::connect(opt).await.unwrap();
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None).await.unwrap();
    db
}

pub fn test_policy() -> LifecycleSettings {
    LifecycleSettings {
        cleanup_interval_secs: 300,
        idle_timeout_secs: 3600,
        engine_stop_timeout_secs: 2,
        drain_entry_timeout_secs: 2,
    }
}

pub struct TestHarness {
    pub db: Arc<DatabaseConnection>,
    pub store: Arc<dyn CheckpointRepository>,
    pub factory: Arc<FakeEngineFactory>,
    pub service: Arc<LifecycleService>,
}

/// Build a fresh lifecycle core over the given database connection.
///
/// Calling this twice on the same connection models a process restart:
/// the registry and engines are gone, the store survives.
pub fn build_core(db: Arc<DatabaseConnection>, fail_flush_sessions: HashSet<String>) -> TestHarness {
    let store: Arc<dyn CheckpointRepository> = Arc::new(CheckpointRepositoryImpl::new(db.clone()));
    let factory = FakeEngineFactory::with_failing_sessions(store.clone(), fail_flush_sessions);
    let registry = Arc::new(SessionRegistry::new(factory.clone()));
    let service = Arc::new(LifecycleService::new(registry, store.clone(), test_policy()));

    TestHarness {
        db,
        store,
        factory,
        service,
    }
}

pub async fn harness() -> TestHarness {
    build_core(setup_db().await, HashSet::new())
}
