// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 从种子URL解析基础域名
///
/// 作业元数据中的 base_domain 由此函数统一产生
pub fn resolve_base_domain(seed_url: &str) -> Result<String, ParseError> {
    let parsed = Url::parse(seed_url)?;
    parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or(ParseError::EmptyHost)
}
