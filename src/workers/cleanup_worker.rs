// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::lifecycle_service::LifecycleService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// 会话空闲清理工作器
///
/// 按固定周期扫描注册表并清理空闲会话；通过 watch 停止标志
/// 协作取消，在两次扫描之间观察停止信号。
pub struct CleanupWorker {
    service: Arc<LifecycleService>,
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl CleanupWorker {
    pub fn new(
        service: Arc<LifecycleService>,
        interval: Duration,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            interval,
            stop_rx,
        }
    }

    /// 运行工作器
    pub async fn run(mut self) {
        info!("Session cleanup worker started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.service.run_cleanup_once().await;
                }
                changed = self.stop_rx.changed() => {
                    // Sender dropped counts as a stop request too
                    if changed.is_err() || *self.stop_rx.borrow() {
                        info!("Session cleanup worker stopping");
                        break;
                    }
                }
            }
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }
}

#[cfg(test)]
#[path = "cleanup_worker_test.rs"]
mod tests;
