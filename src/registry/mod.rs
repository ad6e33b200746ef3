// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 注册表模块
///
/// 会话标识符到引擎实例的映射及其生命周期管理
pub mod session_registry;
