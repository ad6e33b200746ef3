// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：会话、作业与检查点记录
/// - 仓库接口（repositories）：检查点存储抽象接口
/// - 服务（services）：生命周期门面
///
/// 领域层是系统的核心，不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
