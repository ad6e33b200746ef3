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

use crate::domain::models::records::{
    CheckpointSnapshot, CrawlCounts, IssueRecord, LinkRecord, UrlRecord,
};
use crate::domain::models::session::{SessionContext, SessionSettings};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 引擎正在执行另一个作业
    #[error("Engine is busy with job {0}")]
    Busy(Uuid),
    /// 停止请求未在预算时间内完成
    #[error("Stop request timed out")]
    StopTimeout,
    /// 检查点写入失败
    #[error("Checkpoint flush failed: {0}")]
    FlushFailed(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

/// 引擎操作回执
#[derive(Debug, Clone)]
pub struct EngineAck {
    /// 操作是否被接受
    pub ok: bool,
    /// 面向调用方的说明信息
    pub message: String,
    /// 关联的作业ID（start 成功时必填）
    pub job_id: Option<Uuid>,
}

impl EngineAck {
    pub fn ok(message: impl Into<String>, job_id: Option<Uuid>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            job_id,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            job_id: None,
        }
    }
}

/// 引擎运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// 空闲
    Idle,
    /// 运行中
    Running,
    /// 已暂停
    Paused,
    /// 停止中（已收到停止请求，尚未完全停止）
    Stopping,
}

/// 引擎状态快照
///
/// status() 返回结果缓冲区的完整副本，增量切片由服务层
/// 按轮询游标完成。
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// 当前作业ID
    pub job_id: Option<Uuid>,
    /// 运行状态
    pub state: EngineState,
    /// 计数
    pub counts: CrawlCounts,
    /// URL记录缓冲区
    pub urls: Vec<UrlRecord>,
    /// 链接记录缓冲区
    pub links: Vec<LinkRecord>,
    /// 问题记录缓冲区
    pub issues: Vec<IssueRecord>,
}

/// 爬取引擎特质
///
/// 执行实际爬取工作的不透明单元的控制面。引擎内部持有自己的
/// 互斥区保护结果缓冲区，任何方法都不得要求调用方持有注册表锁。
#[async_trait]
pub trait CrawlEngine: Send + Sync {
    /// 以种子URL启动一次爬取
    async fn start(&self, seed_url: &str) -> Result<EngineAck, EngineError>;

    /// 请求停止当前爬取
    ///
    /// 停止是请求而非保证：引擎可能需要有界但非零的时间
    /// 才能观察到停止信号。
    async fn stop(&self) -> Result<EngineAck, EngineError>;

    /// 暂停当前爬取
    async fn pause(&self) -> Result<EngineAck, EngineError>;

    /// 恢复运行
    ///
    /// 空闲且已通过 hydrate 注入快照时，从快照中的游标继续边界队列；
    /// 已暂停时原地继续。
    async fn resume(&self) -> Result<EngineAck, EngineError>;

    /// 读取状态快照
    async fn status(&self) -> EngineStatus;

    /// 立即强制写出检查点，绕过常规批量/节流
    async fn force_flush(&self) -> Result<(), EngineError>;

    /// 持久化恢复游标
    ///
    /// 游标内容由引擎自行定义，但必须满足恢复正确性：
    /// 加载后得到功能等价的边界队列，不重访已完成URL，
    /// 不丢失已发现未访问的URL。
    async fn write_resume_cursor(&self) -> Result<(), EngineError>;

    /// 注入检查点快照
    ///
    /// 引擎必须将计数设置为与快照完全一致（不重复计数），
    /// 并从快照记录重建全部派生索引（如链接去重集合）。
    async fn hydrate(&self, snapshot: CheckpointSnapshot) -> Result<(), EngineError>;

    /// 是否正在运行作业
    fn is_running(&self) -> bool;

    /// 当前绑定的作业ID
    fn current_job_id(&self) -> Option<Uuid>;

    /// 当前作业是否启用了检查点持久化
    fn persistence_enabled(&self) -> bool;
}

/// 引擎工厂特质
///
/// 注册表的注入依赖，按会话上下文和该会话的配置构造引擎实例
pub trait EngineFactory: Send + Sync {
    fn create(&self, ctx: &SessionContext, settings: &SessionSettings) -> Arc<dyn CrawlEngine>;
}
