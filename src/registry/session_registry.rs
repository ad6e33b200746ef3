// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::session::{SessionContext, SessionSettings};
use crate::engines::traits::{CrawlEngine, EngineFactory};
use crate::utils::errors::LifecycleError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 会话句柄
///
/// 从注册表取出的 (引擎, 配置) 对。句柄脱离注册表锁使用：
/// 对引擎的一切操作走引擎自身的内部同步。
#[derive(Clone)]
pub struct SessionHandle {
    /// 引擎实例
    pub engine: Arc<dyn CrawlEngine>,
    /// 会话配置
    pub settings: Arc<SessionSettings>,
}

/// 注册表条目
///
/// 生命周期受空闲超时或进程生存期约束，以先到者为准
struct RegistryEntry {
    engine: Arc<dyn CrawlEngine>,
    settings: Arc<SessionSettings>,
    last_accessed: DateTime<Utc>,
    /// 只读加载后置位，下一次状态轮询忽略增量游标
    force_full_refresh: bool,
}

impl RegistryEntry {
    fn handle(&self) -> SessionHandle {
        SessionHandle {
            engine: self.engine.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// 会话注册表
///
/// 将不透明的会话标识符映射到 (引擎实例, 会话配置, 最近访问时间)。
/// 唯一的互斥区只保护映射结构本身（查找/插入/删除/快照复制），
/// 绝不跨引擎调用持有，慢速爬取操作不会阻塞无关会话。
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
    factory: Arc<dyn EngineFactory>,
    draining: AtomicBool,
}

impl SessionRegistry {
    /// 创建新的会话注册表
    ///
    /// # 参数
    ///
    /// * `factory` - 注入的引擎工厂
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            factory,
            draining: AtomicBool::new(false),
        }
    }

    /// 获取或创建会话对应的引擎
    ///
    /// 已存在时刷新最近访问时间并返回现有句柄；不存在时在映射锁内
    /// 构造引擎和配置并绑定，同一会话ID在并发首次访问下只构造一次。
    /// 排空开始后拒绝新条目。
    pub fn get_or_create(&self, ctx: &SessionContext) -> Result<SessionHandle, LifecycleError> {
        let mut entries = self.entries.lock();

        // Checked under the map lock: once drain has taken its snapshot no
        // entry can slip in behind it.
        if self.draining.load(Ordering::SeqCst) {
            return Err(LifecycleError::Draining);
        }
        let entry = entries.entry(ctx.session_id.clone()).or_insert_with(|| {
            info!(
                session_id = %ctx.session_id,
                owner = ?ctx.owner_id,
                tier = %ctx.tier,
                "Creating new crawler instance for session"
            );
            metrics::counter!("crawlkeep_sessions_created_total").increment(1);
            let settings = Arc::new(SessionSettings::for_context(ctx));
            RegistryEntry {
                engine: self.factory.create(ctx, &settings),
                settings,
                last_accessed: Utc::now(),
                force_full_refresh: false,
            }
        });
        entry.last_accessed = Utc::now();

        Ok(entry.handle())
    }

    /// 分离并返回会话的引擎句柄
    ///
    /// 幂等：移除不存在的会话不是错误
    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        let removed = self.entries.lock().remove(session_id);
        if removed.is_some() {
            metrics::counter!("crawlkeep_sessions_removed_total").increment(1);
        }
        removed.map(|e| e.handle())
    }

    /// 全部条目的时间点快照
    ///
    /// 短临界区：只做复制，不做任何引擎调用
    pub fn snapshot(&self) -> Vec<(String, SessionHandle, DateTime<Utc>)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, e)| (id.clone(), e.handle(), e.last_accessed))
            .collect()
    }

    /// 当前条目数量
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 进入排空状态，此后 get_or_create 一律拒绝
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// 列出空闲超过阈值的会话
    ///
    /// 只复制句柄，停止引擎等慢操作由调用方在锁外完成
    pub fn expired_sessions(
        &self,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Vec<(String, SessionHandle)> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, e)| now - e.last_accessed > idle_threshold)
            .map(|(id, e)| (id.clone(), e.handle()))
            .collect()
    }

    /// 仍然空闲时移除会话
    ///
    /// 清理器在锁外停止引擎后回来删除条目；期间被请求刷新过的
    /// 会话在此重新检查并幸免。
    pub fn remove_if_idle(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> Option<SessionHandle> {
        let mut entries = self.entries.lock();
        match entries.get(session_id) {
            Some(e) if now - e.last_accessed > idle_threshold => {
                metrics::counter!("crawlkeep_sessions_evicted_total").increment(1);
                entries.remove(session_id).map(|e| e.handle())
            }
            _ => None,
        }
    }

    /// 查找正在驱动指定作业的会话
    ///
    /// 单飞不变量的支撑：恢复作业前先找到并停掉已持有该作业的引擎。
    /// 引擎访问在快照副本上进行，不在映射锁内。
    pub fn find_session_running_job(&self, job_id: Uuid) -> Option<(String, SessionHandle)> {
        let snapshot = self.snapshot();
        snapshot
            .into_iter()
            .find(|(_, handle, _)| {
                handle.engine.is_running() && handle.engine.current_job_id() == Some(job_id)
            })
            .map(|(id, handle, _)| (id, handle))
    }

    /// 置位强制全量刷新标记
    ///
    /// 只读加载完成后调用，下一次状态轮询返回全量数据
    pub fn set_force_full_refresh(&self, session_id: &str) -> bool {
        match self.entries.lock().get_mut(session_id) {
            Some(e) => {
                e.force_full_refresh = true;
                true
            }
            None => false,
        }
    }

    /// 取出并清除强制全量刷新标记
    pub fn take_force_full_refresh(&self, session_id: &str) -> bool {
        match self.entries.lock().get_mut(session_id) {
            Some(e) => std::mem::take(&mut e.force_full_refresh),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "session_registry_test.rs"]
mod tests;
