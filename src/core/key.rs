//! 本地相对路径到远端对象键的映射

use std::fmt;

/// 远端对象键：`prefix + "/" + relativePath`，去掉重复和开头的分隔符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey(String);

impl DestinationKey {
    /// 目标前缀本身（可能为空）
    pub fn root(prefix: &str) -> Self {
        Self(join_segments(prefix.split('/')))
    }

    /// 由前缀和以 `/` 分隔的相对路径构造
    pub fn from_relative(prefix: &str, relative: &str) -> Self {
        Self(join_segments(prefix.split('/').chain(relative.split('/'))))
    }

    /// 子项的键，`name` 是单个目录项名称
    pub fn join(&self, name: &str) -> Self {
        let name = name.trim_matches('/');
        if self.0.is_empty() {
            Self(name.to_string())
        } else if name.is_empty() {
            self.clone()
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// 列表用的前缀：空前缀列出整个桶，否则以 `/` 结尾，避免匹配到 `prefix2/...`
    pub fn listing_prefix(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DestinationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
