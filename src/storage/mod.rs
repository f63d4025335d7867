pub mod gcs;
#[cfg(test)]
pub(crate) mod memory;

use crate::core::Fingerprint;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;

pub use gcs::GcsStore;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 单个对象的元数据，每次操作都重新读取，不做缓存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub fingerprint: Option<Fingerprint>,
    pub exists: bool,
}

impl RemoteObject {
    pub fn missing(key: &str) -> Self {
        Self {
            key: key.to_string(),
            fingerprint: None,
            exists: false,
        }
    }
}

/// 前缀列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub key: String,
    pub fingerprint: Option<Fingerprint>,
}

/// 上传用的字节流，调用方打开，`upload` 拥有并在所有路径上释放
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// 列表流，按页惰性拉取
pub type EntryStream = BoxStream<'static, Result<RemoteEntry>>;

/// 远端对象存储接口
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 获取对象元数据，对象不存在时返回 `exists = false`
    async fn object_attributes(&self, key: &str) -> Result<RemoteObject>;

    /// 递归列出以 `prefix` 开头的所有对象，每次调用都从头开始
    async fn list_under_prefix(&self, prefix: &str) -> Result<EntryStream>;

    /// 删除对象，对象本来就不存在不算错误
    async fn delete(&self, key: &str) -> Result<()>;

    /// 流式写入整个对象，完成前对外不可见
    async fn upload(&self, key: &str, data: ByteStream, content_type: Option<&str>) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
