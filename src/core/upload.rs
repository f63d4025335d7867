//! 单文件上传判定

use crate::core::events::{EventSink, SyncEvent};
use crate::core::fingerprint::file_fingerprint_with_buffer;
use crate::core::key::DestinationKey;
use crate::error::{Result, SyncError};
use crate::storage::RemoteStore;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// 遍历得到的本地条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    /// 相对同步根目录，以 `/` 分隔
    pub relative: String,
}

/// 一个上传任务：本地文件及其目标键
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub entry: LocalEntry,
    pub key: DestinationKey,
}

/// 单个任务的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Unchanged,
}

/// 按扩展名确定 Content-Type，未知扩展名使用存储默认值
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "js" => Some("text/javascript"),
        "pdf" => Some("application/pdf"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// 决定一个文件是否需要上传，需要时执行上传
#[derive(Clone)]
pub struct UploadGate {
    store: Arc<dyn RemoteStore>,
    events: EventSink,
    buffer_size: usize,
}

impl UploadGate {
    pub fn new(store: Arc<dyn RemoteStore>, events: EventSink, buffer_size: usize) -> Self {
        Self {
            store,
            events,
            buffer_size,
        }
    }

    pub async fn run(&self, task: &SyncTask) -> Result<UploadOutcome> {
        let path = &task.entry.path;
        let key = task.key.as_str();

        let remote = self.store.object_attributes(key).await?;
        if remote.exists {
            match remote.fingerprint {
                Some(remote_fp) => {
                    let local_fp = file_fingerprint_with_buffer(path, self.buffer_size).await?;
                    if local_fp == remote_fp {
                        self.events.emit(SyncEvent::Unchanged {
                            path: path.clone(),
                            key: key.to_string(),
                        });
                        return Ok(UploadOutcome::Unchanged);
                    }
                    debug!("内容变化: {} (local={}, remote={})", key, local_fp, remote_fp);
                }
                None => debug!("远端对象没有 md5，重新上传: {}", key),
            }
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::read(path, e))?;
        let content_type = content_type_for(path);

        // 文件句柄随流一起交给 upload，任何退出路径都会被释放
        let stream = ReaderStream::with_capacity(file, self.buffer_size).boxed();
        self.store.upload(key, stream, content_type).await?;

        self.events.emit(SyncEvent::Uploaded {
            path: path.clone(),
            key: key.to_string(),
            content_type,
        });
        Ok(UploadOutcome::Uploaded)
    }
}
