// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 访问等级枚举
///
/// 会话的访问等级，决定每个会话的爬取配置上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    /// 访客
    #[default]
    Guest,
    /// 注册用户
    Registered,
    /// 管理员
    Admin,
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessTier::Guest => write!(f, "guest"),
            AccessTier::Registered => write!(f, "registered"),
            AccessTier::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for AccessTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(AccessTier::Guest),
            "registered" => Ok(AccessTier::Registered),
            "admin" => Ok(AccessTier::Admin),
            _ => Err(()),
        }
    }
}

/// 会话上下文
///
/// 标识一次注册表访问的调用方：不透明的会话令牌、
/// 可空的归属用户和访问等级。
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// 会话令牌，每个客户端生成一次，跨请求保持稳定
    pub session_id: String,
    /// 归属用户ID（访客会话为空）
    pub owner_id: Option<Uuid>,
    /// 访问等级
    pub tier: AccessTier,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, owner_id: Option<Uuid>, tier: AccessTier) -> Self {
        Self {
            session_id: session_id.into(),
            owner_id,
            tier,
        }
    }
}

/// 会话级配置
///
/// 每个会话独立持有一份，按 (session_id, owner, tier) 构造。
/// 引擎启动时以JSON形式下发。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// 所属会话令牌
    pub session_id: String,
    /// 归属用户ID
    pub owner_id: Option<Uuid>,
    /// 访问等级
    pub tier: AccessTier,
    /// 单次爬取的最大URL数
    pub max_urls: u32,
    /// 最大爬取深度
    pub max_depth: u32,
    /// 是否启用检查点持久化
    pub persistence_enabled: bool,
}

impl SessionSettings {
    /// 按访问等级构造会话配置
    ///
    /// 访客受最严格的上限约束且不做持久化，管理员不设上限。
    pub fn for_context(ctx: &SessionContext) -> Self {
        let (max_urls, max_depth, persistence_enabled) = match ctx.tier {
            AccessTier::Guest => (500, 3, false),
            AccessTier::Registered => (10_000, 10, true),
            AccessTier::Admin => (1_000_000, 50, true),
        };

        Self {
            session_id: ctx.session_id.clone(),
            owner_id: ctx.owner_id,
            tier: ctx.tier,
            max_urls,
            max_depth,
            persistence_enabled,
        }
    }

    /// 序列化为引擎可消费的爬取配置
    pub fn crawl_config(&self) -> serde_json::Value {
        serde_json::json!({
            "max_urls": self.max_urls,
            "max_depth": self.max_depth,
            "persistence_enabled": self.persistence_enabled,
        })
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
