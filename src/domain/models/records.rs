// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// URL记录
///
/// 一个已爬取页面的快照条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    /// 页面URL
    pub url: String,
    /// HTTP状态码（未完成抓取时为空）
    pub status_code: Option<i32>,
    /// 页面标题
    pub title: Option<String>,
    /// 内容类型
    pub content_type: Option<String>,
    /// 距种子URL的深度
    pub depth: i32,
    /// 响应时间（毫秒）
    pub response_time_ms: Option<i64>,
}

/// 链接记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    /// 链接来源页面URL
    pub source_url: String,
    /// 链接目标URL
    pub target_url: String,
    /// 锚文本
    pub anchor_text: Option<String>,
    /// 是否为站内链接
    pub is_internal: bool,
}

impl LinkRecord {
    /// 链接去重键，同一 (source, target) 对只计一次
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.source_url, self.target_url)
    }
}

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// 错误
    Error,
    /// 警告
    Warning,
    /// 提示
    Notice,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "error"),
            IssueSeverity::Warning => write!(f, "warning"),
            IssueSeverity::Notice => write!(f, "notice"),
        }
    }
}

impl std::str::FromStr for IssueSeverity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(IssueSeverity::Error),
            "warning" => Ok(IssueSeverity::Warning),
            "notice" => Ok(IssueSeverity::Notice),
            _ => Err(()),
        }
    }
}

/// 问题记录
///
/// 引擎在爬取过程中检出的单个问题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    /// 问题所在页面URL
    pub url: String,
    /// 问题类别（引擎自定义）
    pub category: String,
    /// 严重程度
    pub severity: IssueSeverity,
    /// 问题描述
    pub message: String,
}

/// 爬取计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCounts {
    /// 已发现的URL数量
    pub discovered: i32,
    /// 已爬取的URL数量
    pub crawled: i32,
}

/// 队列检查点
///
/// 引擎边界队列（frontier）的不透明恢复游标。内容格式由引擎自行定义，
/// 存储层只负责按爬取ID原样保存和返回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCheckpoint {
    /// 不透明的游标载荷
    pub payload: serde_json::Value,
    /// 写入时间
    pub updated_at: DateTime<Utc>,
}

/// 检查点快照
///
/// 一个作业工作状态的完整快照，用于恢复注入。
#[derive(Debug, Clone)]
pub struct CheckpointSnapshot {
    /// 作业元数据
    pub job: CrawlJob,
    /// URL记录全集
    pub urls: Vec<UrlRecord>,
    /// 链接记录全集
    pub links: Vec<LinkRecord>,
    /// 问题记录全集
    pub issues: Vec<IssueRecord>,
    /// 恢复游标（只读加载时为空）
    pub cursor: Option<QueueCheckpoint>,
}

impl CheckpointSnapshot {
    /// 从加载的记录重建链接去重索引
    ///
    /// 派生索引必须从持久化记录重建，不能假定为空，
    /// 否则恢复后继续爬取会重复记录已知链接。
    pub fn link_keys(&self) -> HashSet<String> {
        self.links.iter().map(|l| l.dedup_key()).collect()
    }

    /// 快照中的计数，恢复后引擎计数必须与之完全一致
    pub fn counts(&self) -> CrawlCounts {
        CrawlCounts {
            discovered: self.urls.len() as i32,
            crawled: self.urls.len() as i32,
        }
    }
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
