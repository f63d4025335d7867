//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 后端错误来源（opendal 或测试用的假存储）
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 同步过程中的所有错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 参数错误（URI 格式不对、缺少参数）
    #[error("{0}")]
    Argument(String),

    /// 缺少必需的环境变量
    #[error("Environment Variable {0} not specified")]
    Config(String),

    /// 启动时无法访问存储桶
    #[error("Bucket Error: {bucket}: {source}")]
    BackendAuth {
        bucket: String,
        #[source]
        source: BoxError,
    },

    /// 同步过程中的存储操作失败（list/stat/write/delete）
    #[error("{op} {key}: {source}")]
    Backend {
        op: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    /// 本地文件不可读
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 本地目录不可读
    #[error("cannot read directory {}: {source}", .path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 上传任务 panic 或被中止
    #[error("upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("upload limiter closed")]
    Limiter(#[from] tokio::sync::AcquireError),
}

impl SyncError {
    pub fn backend(op: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SyncError::Backend {
            op,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn traversal(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Traversal {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
