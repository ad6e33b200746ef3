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

use crate::config::settings::Settings;
use crate::domain::repositories::checkpoint_repository::CheckpointRepository;
use crate::domain::services::lifecycle_service::{DrainReport, LifecycleService};
use crate::engines::traits::EngineFactory;
use crate::infrastructure::database::connection;
use crate::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use crate::registry::session_registry::SessionRegistry;
use crate::workers::manager::LifecycleSupervisor;
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

/// 爬取运行时
///
/// 进程级的显式装配：数据库连接池、迁移、启动时崩溃恢复扫描、
/// 注册表/服务构造和后台清理工作器，生命周期与进程一致，
/// 显式 start/shutdown 而非隐式全局状态。
///
/// 假定同一时刻只有一个进程拥有检查点存储；跨进程的单飞约束
/// 不在此处保证。
pub struct CrawlRuntime {
    db: Arc<DatabaseConnection>,
    service: Arc<LifecycleService>,
    supervisor: LifecycleSupervisor,
}

impl CrawlRuntime {
    /// 启动运行时
    ///
    /// 依次执行：建立连接池 → 应用迁移 → 崩溃恢复扫描 →
    /// 构造注册表与服务 → 启动后台清理。宿主负责在此之前
    /// 完成遥测初始化（telemetry::init_telemetry / metrics::init_metrics）。
    pub async fn start(
        settings: Settings,
        engine_factory: Arc<dyn EngineFactory>,
    ) -> anyhow::Result<Self> {
        info!("Starting crawlkeep runtime...");

        // 1. Connect to database
        let db = Arc::new(connection::create_pool(&settings.database).await?);
        info!("Database connection established");

        // 2. Run database migrations
        info!("Running database migrations...");
        Migrator::up(db.as_ref(), None).await?;
        info!("Database migrations applied");

        // 3. Crash recovery scan, before any session exists: a persisted
        //    `running` status at this point means the previous process died
        //    without draining.
        let store: Arc<dyn CheckpointRepository> =
            Arc::new(CheckpointRepositoryImpl::new(db.clone()));
        let recovered = store.fail_interrupted_jobs().await?;
        if recovered > 0 {
            warn!(
                "Crash recovery: marked {} interrupted crawls as failed, resumable from dashboard",
                recovered
            );
        }

        // 4. Build registry and lifecycle service
        let registry = Arc::new(SessionRegistry::new(engine_factory));
        let service = Arc::new(LifecycleService::new(
            registry,
            store,
            settings.lifecycle.clone(),
        ));

        // 5. Start background cleanup
        let mut supervisor = LifecycleSupervisor::new(service.clone(), settings.lifecycle.clone());
        supervisor.start();

        Ok(Self {
            db,
            service,
            supervisor,
        })
    }

    /// 生命周期服务门面
    pub fn service(&self) -> &Arc<LifecycleService> {
        &self.service
    }

    /// 底层数据库连接（供宿主扩展使用）
    pub fn db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }

    /// 阻塞到终止信号后排空
    pub async fn run_until_shutdown(&mut self) -> DrainReport {
        self.supervisor.wait_for_shutdown().await
    }

    /// 立即执行有序关闭
    pub async fn shutdown(&mut self) -> DrainReport {
        self.supervisor.shutdown().await
    }
}
