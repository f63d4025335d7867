//! 同步动作记录
//!
//! 各组件通过注入的 `EventSink` 输出动作日志，而不是直接依赖全局状态，
//! 测试可以订阅事件来断言上传/删除行为。

use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// 单个同步动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// 开始处理目录
    Directory {
        path: PathBuf,
        key: String,
        entries: usize,
    },
    /// 文件已上传
    Uploaded {
        path: PathBuf,
        key: String,
        content_type: Option<&'static str>,
    },
    /// 远端内容一致，跳过
    Unchanged { path: PathBuf, key: String },
    /// 远端孤儿对象已删除
    Deleted { key: String, local_path: PathBuf },
}

/// 动作日志句柄，克隆后在各任务间共享
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventSink {
    /// 只写 tracing 日志
    pub fn tracing() -> Self {
        Self { tx: None }
    }

    /// 写日志，同时把事件转发到通道
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SyncEvent) {
        match &event {
            SyncEvent::Directory { path, key, entries } => {
                info!("syncing dir: {} -> {}", path.display(), key);
                debug!("{} : {} files", path.display(), entries);
            }
            SyncEvent::Uploaded { path, key, .. } => {
                info!("upload: {} -> {}", path.display(), key);
            }
            SyncEvent::Unchanged { path, .. } => {
                info!("not modified: {}", path.display());
            }
            SyncEvent::Deleted { key, local_path } => {
                info!(
                    "delete object: {} (local file {} is not exists)",
                    key,
                    local_path.display()
                );
            }
        }

        if let Some(tx) = &self.tx {
            // 接收端已关闭时忽略
            let _ = tx.send(event);
        }
    }
}
