// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::{CrawlJob, CrawlJobStatus};
use crate::domain::models::records::{IssueRecord, LinkRecord, QueueCheckpoint, UrlRecord};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 作业查询参数
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub owner_id: Option<Uuid>,
    pub statuses: Option<Vec<CrawlJobStatus>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// 检查点存储特质
///
/// 定义爬取作业元数据、URL/链接/问题记录和队列检查点的持久化接口。
/// 纯存储，不含策略；该特质遵循依赖倒置原则，领域层不依赖具体实现。
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// 写入作业元数据（已存在时整体覆盖）
    async fn write_job(&self, job: &CrawlJob) -> Result<CrawlJob, RepositoryError>;

    /// 根据ID读取作业元数据
    async fn read_job(&self, id: Uuid) -> Result<Option<CrawlJob>, RepositoryError>;

    /// 按过滤条件列出作业
    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<CrawlJob>, RepositoryError>;

    /// 更新作业状态
    async fn set_status(&self, id: Uuid, status: CrawlJobStatus) -> Result<(), RepositoryError>;

    /// 用新的记录全集替换作业的URL记录
    ///
    /// 引擎检查点是全集快照，写入即整体替换。
    async fn replace_urls(&self, id: Uuid, urls: &[UrlRecord]) -> Result<(), RepositoryError>;

    /// 读取作业的URL记录
    async fn read_urls(&self, id: Uuid) -> Result<Vec<UrlRecord>, RepositoryError>;

    /// 用新的记录全集替换作业的链接记录
    async fn replace_links(&self, id: Uuid, links: &[LinkRecord]) -> Result<(), RepositoryError>;

    /// 读取作业的链接记录
    async fn read_links(&self, id: Uuid) -> Result<Vec<LinkRecord>, RepositoryError>;

    /// 用新的记录全集替换作业的问题记录
    async fn replace_issues(&self, id: Uuid, issues: &[IssueRecord])
        -> Result<(), RepositoryError>;

    /// 读取作业的问题记录
    async fn read_issues(&self, id: Uuid) -> Result<Vec<IssueRecord>, RepositoryError>;

    /// 写入队列检查点（每个作业一条，覆盖写）
    async fn write_queue_checkpoint(
        &self,
        id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), RepositoryError>;

    /// 读取队列检查点
    async fn read_queue_checkpoint(
        &self,
        id: Uuid,
    ) -> Result<Option<QueueCheckpoint>, RepositoryError>;

    /// 删除作业及其全部关联数据
    async fn delete_job(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 将所有状态为 running 的作业标记为 failed
    ///
    /// 进程启动时的崩溃检测扫描：启动时仍为 running 的持久化状态
    /// 只能来自未走优雅关闭路径的上一个进程。
    async fn fail_interrupted_jobs(&self) -> Result<u64, RepositoryError>;
}
