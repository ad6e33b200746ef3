// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::LifecycleSettings;
use crate::domain::models::crawl_job::{CrawlJob, CrawlJobStatus};
use crate::domain::models::records::{CheckpointSnapshot, CrawlCounts, IssueRecord, LinkRecord, UrlRecord};
use crate::domain::models::session::{AccessTier, SessionContext};
use crate::domain::repositories::checkpoint_repository::{CheckpointRepository, JobFilter};
use crate::engines::traits::{CrawlEngine, EngineAck, EngineState};
use crate::registry::session_registry::{SessionHandle, SessionRegistry};
use crate::utils::errors::LifecycleError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 状态轮询游标
///
/// 每个集合一个 since 下标，为空表示要求全量
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusCursor {
    pub url_since: Option<usize>,
    pub link_since: Option<usize>,
    pub issue_since: Option<usize>,
}

/// 状态轮询结果
#[derive(Debug, Clone)]
pub struct StatusPage {
    /// 当前作业ID
    pub job_id: Option<Uuid>,
    /// 引擎运行状态
    pub state: EngineState,
    /// 计数
    pub counts: CrawlCounts,
    /// URL记录（按游标切片后）
    pub urls: Vec<UrlRecord>,
    /// 链接记录（按游标切片后）
    pub links: Vec<LinkRecord>,
    /// 问题记录（按游标切片后）
    pub issues: Vec<IssueRecord>,
    /// 本次是否忽略游标返回了全量数据
    pub full_refresh: bool,
}

/// 只读加载结果
#[derive(Debug, Clone, Copy)]
pub struct LoadSummary {
    pub urls: usize,
    pub links: usize,
    pub issues: usize,
}

/// 排空结果报告
///
/// 单条目失败只进入 errors，绝不中止对其余条目的处理
#[derive(Debug, Default)]
pub struct DrainReport {
    /// 快照中的条目总数
    pub processed: usize,
    /// 成功刷写并置为 paused 的作业数
    pub flushed: usize,
    /// (会话ID, 错误描述) 列表
    pub errors: Vec<(String, String)>,
}

/// 生命周期服务
///
/// 面向Web层协作者的核心门面：会话获取、作业恢复/只读加载、
/// 状态轮询、空闲清理与优雅排空。
pub struct LifecycleService {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn CheckpointRepository>,
    policy: LifecycleSettings,
}

impl LifecycleService {
    /// 创建新的生命周期服务实例
    ///
    /// # 参数
    ///
    /// * `registry` - 会话注册表
    /// * `store` - 检查点存储
    /// * `policy` - 生命周期策略配置
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn CheckpointRepository>,
        policy: LifecycleSettings,
    ) -> Self {
        Self {
            registry,
            store,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 获取或创建会话引擎
    pub fn get_or_create(
        &self,
        session_id: &str,
        owner: Option<Uuid>,
        tier: AccessTier,
    ) -> Result<SessionHandle, LifecycleError> {
        let ctx = SessionContext::new(session_id, owner, tier);
        self.registry.get_or_create(&ctx)
    }

    /// 移除会话（幂等）
    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.registry.remove(session_id)
    }

    /// 启动一次新的爬取
    ///
    /// 引擎忙时显式拒绝：一个会话的引擎同一时刻只驱动一个作业，
    /// 调用方需要先停止当前爬取，绝不静默排队第二个。
    pub async fn start_crawl(
        &self,
        ctx: &SessionContext,
        seed_url: &str,
    ) -> Result<EngineAck, LifecycleError> {
        let handle = self.registry.get_or_create(ctx)?;

        if handle.engine.is_running() {
            let current = handle
                .engine
                .current_job_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(LifecycleError::AlreadyRunning(current));
        }

        let ack = handle
            .engine
            .start(seed_url)
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;
        if ack.ok {
            info!(session_id = %ctx.session_id, job_id = ?ack.job_id, "Crawl started");
        }
        Ok(ack)
    }

    /// 状态轮询
    ///
    /// 提供游标时按集合切片做增量返回；会话带有强制全量刷新标记时
    /// 忽略游标一次并清除标记，否则只读加载的历史作业会显得为空。
    pub async fn poll_status(
        &self,
        ctx: &SessionContext,
        cursor: StatusCursor,
    ) -> Result<StatusPage, LifecycleError> {
        let handle = self.registry.get_or_create(ctx)?;
        let force_full = self.registry.take_force_full_refresh(&ctx.session_id);

        // Engine call happens outside any registry lock
        let status = handle.engine.status().await;

        let mut page = StatusPage {
            job_id: status.job_id,
            state: status.state,
            counts: status.counts,
            urls: status.urls,
            links: status.links,
            issues: status.issues,
            full_refresh: force_full,
        };

        if !force_full {
            if let Some(since) = cursor.url_since {
                page.urls = page.urls.split_off(since.min(page.urls.len()));
            }
            if let Some(since) = cursor.link_since {
                page.links = page.links.split_off(since.min(page.links.len()));
            }
            if let Some(since) = cursor.issue_since {
                page.issues = page.issues.split_off(since.min(page.issues.len()));
            }
        }

        Ok(page)
    }

    /// 从检查点恢复作业
    ///
    /// 恢复由持久化作业驱动，与哪个会话发起无关；依次执行：
    /// 所有权校验、单飞抢占（停掉已持有该作业的引擎）、
    /// 本会话引擎忙则先停、快照注入、状态转换、从游标继续。
    pub async fn resume_job(
        &self,
        job_id: Uuid,
        ctx: &SessionContext,
    ) -> Result<EngineAck, LifecycleError> {
        let job = self.require_owned_job(job_id, ctx.owner_id).await?;

        // A job already marked running is claimable (its engine gets stopped
        // below); anything else must be a legal transition into Running.
        if job.status != CrawlJobStatus::Running
            && !job.status.can_transition_to(CrawlJobStatus::Running)
        {
            return Err(LifecycleError::InvalidTransition(
                job.status.to_string(),
                CrawlJobStatus::Running.to_string(),
            ));
        }

        // Single-flight: at most one live engine may drive a crawl id.
        // Whoever holds it now gets stopped before this session takes over.
        if let Some((other_session, other)) = self.registry.find_session_running_job(job_id) {
            info!(
                job_id = %job_id,
                session_id = %other_session,
                "Stopping engine already running this job in another session"
            );
            self.stop_engine(&other.engine).await?;
        }

        let handle = self.registry.get_or_create(ctx)?;
        if handle.engine.is_running() {
            // Never queue two crawls on one engine: stop first
            self.stop_engine(&handle.engine).await?;
        }

        let snapshot = self.load_snapshot(&job, true).await?;
        let loaded = (snapshot.urls.len(), snapshot.links.len(), snapshot.issues.len());
        handle
            .engine
            .hydrate(snapshot)
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;

        self.store.set_status(job_id, CrawlJobStatus::Running).await?;

        let ack = handle
            .engine
            .resume()
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;
        if !ack.ok {
            return Err(LifecycleError::Engine(ack.message));
        }

        info!(
            job_id = %job_id,
            urls = loaded.0,
            links = loaded.1,
            issues = loaded.2,
            "Resumed crawl from checkpoint"
        );
        metrics::counter!("crawlkeep_jobs_resumed_total").increment(1);

        Ok(EngineAck::ok(
            format!(
                "Resumed crawl with {} URLs, {} links, {} issues",
                loaded.0, loaded.1, loaded.2
            ),
            Some(job_id),
        ))
    }

    /// 只读加载历史作业到当前会话
    ///
    /// 与恢复同一套注入机制，但不做状态转换；加载后置位强制全量
    /// 刷新标记，使下一次状态轮询返回完整数据集。
    pub async fn load_job_readonly(
        &self,
        job_id: Uuid,
        ctx: &SessionContext,
    ) -> Result<LoadSummary, LifecycleError> {
        let job = self.require_owned_job(job_id, ctx.owner_id).await?;

        let handle = self.registry.get_or_create(ctx)?;
        if handle.engine.is_running() {
            self.stop_engine(&handle.engine).await?;
        }

        let snapshot = self.load_snapshot(&job, false).await?;
        let summary = LoadSummary {
            urls: snapshot.urls.len(),
            links: snapshot.links.len(),
            issues: snapshot.issues.len(),
        };

        handle
            .engine
            .hydrate(snapshot)
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;

        self.registry.set_force_full_refresh(&ctx.session_id);

        info!(
            job_id = %job_id,
            urls = summary.urls,
            links = summary.links,
            issues = summary.issues,
            "Loaded historical crawl into session"
        );

        Ok(summary)
    }

    /// 列出作业
    ///
    /// 调用方的 owner 作为过滤条件注入，只返回其可见的作业
    pub async fn list_jobs(
        &self,
        owner: Option<Uuid>,
        mut filter: JobFilter,
    ) -> Result<Vec<CrawlJob>, LifecycleError> {
        filter.owner_id = owner;
        Ok(self.store.list_jobs(filter).await?)
    }

    /// 删除作业及其全部数据
    pub async fn delete_job(
        &self,
        job_id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<(), LifecycleError> {
        self.require_owned_job(job_id, owner).await?;
        self.store.delete_job(job_id).await?;
        info!(job_id = %job_id, "Deleted crawl job");
        Ok(())
    }

    /// 执行一轮空闲清理
    ///
    /// 返回本轮移除的会话数
    pub async fn run_cleanup_once(&self) -> usize {
        self.evict_idle_at(Utc::now()).await
    }

    /// 按给定时刻执行空闲清理
    ///
    /// 清理器对每个过期会话先尽力停止引擎（失败只记日志，不阻止
    /// 移除），再回到锁内确认仍然空闲后移除。
    pub async fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        if self.registry.is_draining() {
            return 0;
        }

        let threshold = self.policy.idle_timeout();
        let expired = self.registry.expired_sessions(now, threshold);
        let mut removed = 0;

        for (session_id, handle) in expired {
            if handle.engine.is_running() {
                if let Err(e) = self.stop_engine(&handle.engine).await {
                    warn!(
                        session_id = %session_id,
                        error = %e,
                        "Best-effort stop failed during eviction, removing anyway"
                    );
                }
            }

            if self
                .registry
                .remove_if_idle(&session_id, now, threshold)
                .is_some()
            {
                info!(session_id = %session_id, "Cleaned up inactive crawler instance");
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Cleaned up {} inactive crawler instances", removed);
        }
        removed
    }

    /// 优雅排空全部会话
    ///
    /// 先拒绝新会话，再对快照中每个正在运行且启用持久化的引擎：
    /// 强制刷写检查点、持久化恢复游标、将作业状态置为 paused。
    /// 每个条目受独立截止时间约束，单条目失败收集后继续。
    pub async fn drain_all(&self) -> DrainReport {
        self.registry.begin_drain();

        let entries = self.registry.snapshot();
        let mut report = DrainReport {
            processed: entries.len(),
            ..Default::default()
        };

        // Entries flush concurrently, each against its own deadline, so one
        // stuck engine cannot hold up the whole drain.
        let deadline = self.policy.drain_entry_timeout();
        let flushes = entries.into_iter().filter_map(|(session_id, handle, _)| {
            let job_id = match handle.engine.current_job_id() {
                Some(id) if handle.engine.is_running() && handle.engine.persistence_enabled() => id,
                _ => return None,
            };
            Some(async move {
                info!(session_id = %session_id, job_id = %job_id, "Saving crawl before shutdown");
                let outcome =
                    tokio::time::timeout(deadline, self.flush_entry(&handle.engine, job_id)).await;
                (session_id, job_id, outcome)
            })
        });

        for (session_id, job_id, outcome) in futures::future::join_all(flushes).await {
            match outcome {
                Ok(Ok(())) => {
                    report.flushed += 1;
                    metrics::counter!("crawlkeep_jobs_drained_total").increment(1);
                }
                Ok(Err(e)) => {
                    error!(session_id = %session_id, job_id = %job_id, error = %e, "Error saving crawl during drain");
                    report.errors.push((session_id, e.to_string()));
                }
                Err(_) => {
                    error!(session_id = %session_id, job_id = %job_id, "Drain deadline exceeded for entry");
                    report
                        .errors
                        .push((session_id, "checkpoint flush deadline exceeded".to_string()));
                }
            }
        }

        report
    }

    /// 排空单个条目：强制检查点、写游标、置为 paused
    async fn flush_entry(
        &self,
        engine: &Arc<dyn CrawlEngine>,
        job_id: Uuid,
    ) -> Result<(), LifecycleError> {
        engine
            .force_flush()
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;
        engine
            .write_resume_cursor()
            .await
            .map_err(|e| LifecycleError::Engine(e.to_string()))?;
        self.store.set_status(job_id, CrawlJobStatus::Paused).await?;
        Ok(())
    }

    /// 读取作业并校验所有权
    async fn require_owned_job(
        &self,
        job_id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<CrawlJob, LifecycleError> {
        let job = self
            .store
            .read_job(job_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(job_id.to_string()))?;

        // Guests own nothing; a job with a null owner is open to its session
        if let Some(job_owner) = job.owner_id {
            if owner != Some(job_owner) {
                return Err(LifecycleError::Unauthorized);
            }
        }

        Ok(job)
    }

    /// 从存储装配检查点快照
    async fn load_snapshot(
        &self,
        job: &CrawlJob,
        with_cursor: bool,
    ) -> Result<CheckpointSnapshot, LifecycleError> {
        let urls = self.store.read_urls(job.id).await?;
        let links = self.store.read_links(job.id).await?;
        let issues = self.store.read_issues(job.id).await?;
        let cursor = if with_cursor {
            self.store.read_queue_checkpoint(job.id).await?
        } else {
            None
        };

        Ok(CheckpointSnapshot {
            job: job.clone(),
            urls,
            links,
            issues,
            cursor,
        })
    }

    /// 有界时间内停止引擎
    ///
    /// 超时不丢弃失败信息，显式返回给调用方记录
    async fn stop_engine(&self, engine: &Arc<dyn CrawlEngine>) -> Result<(), LifecycleError> {
        let budget = self.policy.engine_stop_timeout();
        match tokio::time::timeout(budget, engine.stop()).await {
            Ok(Ok(ack)) if ack.ok => Ok(()),
            Ok(Ok(ack)) => Err(LifecycleError::Engine(ack.message)),
            Ok(Err(e)) => Err(LifecycleError::Engine(e.to_string())),
            Err(_) => Err(LifecycleError::EngineStopTimeout),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_service_test.rs"]
mod tests;
