// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::checkpoint_repository::RepositoryError;
use thiserror::Error;

/// 生命周期层错误类型
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("未找到: {0}")]
    NotFound(String),

    #[error("未授权访问该作业")]
    Unauthorized,

    #[error("会话引擎正在运行作业 {0}")]
    AlreadyRunning(String),

    #[error("持久化失败: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("引擎停止超时")]
    EngineStopTimeout,

    #[error("引擎错误: {0}")]
    Engine(String),

    #[error("注册表正在排空，不再接受新会话")]
    Draining,

    #[error("非法状态转换: {0} -> {1}")]
    InvalidTransition(String, String),
}
