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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库和生命周期策略的所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 生命周期策略配置
    pub lifecycle: LifecycleSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 生命周期策略配置
///
/// 清理周期和空闲阈值是策略值而非常量，各自独立可调
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleSettings {
    /// 空闲清理周期（秒）
    pub cleanup_interval_secs: u64,
    /// 会话空闲阈值（秒），超过即被清理
    pub idle_timeout_secs: u64,
    /// 尽力停止引擎的预算时间（秒）
    pub engine_stop_timeout_secs: u64,
    /// 排空时每个条目的刷写截止时间（秒）
    pub drain_entry_timeout_secs: u64,
}

impl LifecycleSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_timeout_secs as i64)
    }

    pub fn engine_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_stop_timeout_secs)
    }

    pub fn drain_entry_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_entry_timeout_secs)
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Default DB pool settings
            .set_default("database.url", "sqlite://crawlkeep.db")?
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default lifecycle policy: sweep every 5 minutes, evict after 1 hour idle
            .set_default("lifecycle.cleanup_interval_secs", 300)?
            .set_default("lifecycle.idle_timeout_secs", 3600)?
            .set_default("lifecycle.engine_stop_timeout_secs", 10)?
            .set_default("lifecycle.drain_entry_timeout_secs", 30)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("CRAWLKEEP").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
