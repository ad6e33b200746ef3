// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LifecycleSettings;
use crate::domain::services::lifecycle_service::{DrainReport, LifecycleService};
use crate::workers::cleanup_worker::CleanupWorker;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 生命周期监督器
///
/// 持有清理工作器的句柄，负责启动后台扫描、等待终止信号
/// 并执行有序关闭：先停掉并等待清理器退出，再排空注册表，
/// 保证清理和排空不会并发作用于同一条目。
pub struct LifecycleSupervisor {
    service: Arc<LifecycleService>,
    settings: LifecycleSettings,
    stop_tx: watch::Sender<bool>,
    sweeper: Option<JoinHandle<()>>,
}

impl LifecycleSupervisor {
    pub fn new(service: Arc<LifecycleService>, settings: LifecycleSettings) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            service,
            settings,
            stop_tx,
            sweeper: None,
        }
    }

    /// 启动后台清理工作器
    pub fn start(&mut self) {
        let worker = CleanupWorker::new(
            self.service.clone(),
            self.settings.cleanup_interval(),
            self.stop_tx.subscribe(),
        );
        self.sweeper = Some(worker.start());
        info!(
            interval_secs = self.settings.cleanup_interval_secs,
            idle_timeout_secs = self.settings.idle_timeout_secs,
            "Started crawler instance cleanup worker"
        );
    }

    /// 等待关闭信号并执行有序关闭
    ///
    /// 监听终止信号，随后排空所有活动会话
    pub async fn wait_for_shutdown(&mut self) -> DrainReport {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown().await
    }

    /// 有序关闭
    ///
    /// 1. 通知清理工作器停止并等待其退出当前迭代
    /// 2. 排空注册表：逐条目强制检查点并置为 paused
    /// 3. 汇总报告后返回，进程此后才可退出
    pub async fn shutdown(&mut self) -> DrainReport {
        info!("Saving all active crawls before shutdown...");

        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.sweeper.take() {
            if let Err(e) = handle.await {
                warn!("Cleanup worker terminated abnormally: {}", e);
            }
        }

        let report = self.service.drain_all().await;

        if report.errors.is_empty() {
            info!(
                flushed = report.flushed,
                sessions = report.processed,
                "All crawls saved successfully"
            );
        } else {
            for (session_id, err) in &report.errors {
                error!(session_id = %session_id, error = %err, "Failed to save crawl during shutdown");
            }
            warn!(
                flushed = report.flushed,
                failed = report.errors.len(),
                "Shutdown drain finished with errors"
            );
        }

        report
    }
}
