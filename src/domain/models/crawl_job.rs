// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 爬取作业实体
///
/// 持久化的爬取作业记录，独立于任何会话的生命周期。
/// 以爬取标识符为键，进程重启后仍然存在。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    /// 爬取作业唯一标识符，跨进程重启保持稳定
    pub id: Uuid,
    /// 归属用户ID（匿名/访客会话为空）
    pub owner_id: Option<Uuid>,
    /// 种子URL，爬取的起始地址
    pub seed_url: String,
    /// 从种子URL解析出的基础域名
    pub base_domain: String,
    /// 作业状态，见状态机转换规则
    pub status: CrawlJobStatus,
    /// 爬取配置，JSON格式的作业参数
    pub config: serde_json::Value,
    /// 最近一次检查点时已发现的URL数量
    pub discovered_count: i32,
    /// 最近一次检查点时已爬取的URL数量
    pub crawled_count: i32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
    /// 最近一次检查点写入时间（尚未检查点时为空）
    pub last_checkpoint_at: Option<DateTime<Utc>>,
}

/// 爬取作业状态枚举
///
/// 状态转换规则：
/// Running → Completed/Failed/Paused
/// Paused → Running/Archived
/// Failed → Running/Archived
/// Completed 和 Archived 不允许任何转换（只能显式删除）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrawlJobStatus {
    /// 运行中
    #[default]
    Running,
    /// 已暂停
    Paused,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 已归档
    Archived,
}

impl CrawlJobStatus {
    /// 判断状态转换是否合法
    ///
    /// # 参数
    ///
    /// * `next` - 目标状态
    ///
    /// # 返回值
    ///
    /// 转换合法时返回true
    pub fn can_transition_to(self, next: CrawlJobStatus) -> bool {
        use CrawlJobStatus::*;
        match (self, next) {
            (Running, Completed) | (Running, Failed) | (Running, Paused) => true,
            (Paused, Running) | (Paused, Archived) => true,
            // A crashed job is recoverable: boot-time detection marks it
            // Failed, and the user resumes it from the dashboard.
            (Failed, Running) | (Failed, Archived) => true,
            _ => false,
        }
    }

    /// 判断作业是否可以从检查点恢复
    pub fn is_resumable(self) -> bool {
        matches!(self, CrawlJobStatus::Paused | CrawlJobStatus::Failed)
    }
}

/// 将作业状态格式化为字符串表示
///
/// 用于日志记录和数据库存储
impl fmt::Display for CrawlJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlJobStatus::Running => write!(f, "running"),
            CrawlJobStatus::Paused => write!(f, "paused"),
            CrawlJobStatus::Completed => write!(f, "completed"),
            CrawlJobStatus::Failed => write!(f, "failed"),
            CrawlJobStatus::Archived => write!(f, "archived"),
        }
    }
}

/// 从字符串解析作业状态
///
/// 用于从数据库恢复状态值
impl FromStr for CrawlJobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CrawlJobStatus::Running),
            "paused" => Ok(CrawlJobStatus::Paused),
            "completed" => Ok(CrawlJobStatus::Completed),
            "failed" => Ok(CrawlJobStatus::Failed),
            "archived" => Ok(CrawlJobStatus::Archived),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
#[path = "crawl_job_test.rs"]
mod tests;
