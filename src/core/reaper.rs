//! 删除远端孤儿对象（本地已不存在的文件）

use crate::core::events::{EventSink, SyncEvent};
use crate::core::key::DestinationKey;
use crate::error::{Result, SyncError};
use crate::storage::RemoteStore;
use futures::TryStreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 本地路径的检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalState {
    /// 普通文件，保留远端对象
    File,
    /// 不存在，或不是普通文件
    Absent,
}

pub struct OrphanReaper {
    store: Arc<dyn RemoteStore>,
    events: EventSink,
}

impl OrphanReaper {
    pub fn new(store: Arc<dyn RemoteStore>, events: EventSink) -> Self {
        Self { store, events }
    }

    /// 列出前缀下所有对象，删除没有对应本地文件的对象，返回删除数量
    pub async fn reap(&self, prefix: &DestinationKey, root: &Path) -> Result<u64> {
        let listing_prefix = prefix.listing_prefix();
        info!(
            "检查孤儿对象: {}/{} <- {}",
            self.store.name(),
            listing_prefix,
            root.display()
        );

        let mut entries = self.store.list_under_prefix(&listing_prefix).await?;
        let mut deleted = 0u64;

        while let Some(entry) = entries.try_next().await? {
            let Some(rest) = entry.key.strip_prefix(listing_prefix.as_str()) else {
                continue;
            };
            // 目录占位对象，或前缀本身
            if rest.is_empty() || rest.ends_with('/') {
                debug!("跳过目录对象: {}", entry.key);
                continue;
            }

            let (local_path, state) = match local_path_for(root, rest) {
                Some(path) => {
                    let state = local_state(&path).await?;
                    (path, state)
                }
                // `.`/`..` 段无法由本地文件生成
                None => (root.join(rest), LocalState::Absent),
            };

            if state == LocalState::Absent {
                self.events.emit(SyncEvent::Deleted {
                    key: entry.key.clone(),
                    local_path,
                });
                self.store.delete(&entry.key).await?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}

/// 把去掉前缀后的键拼回本地根目录，重复的分隔符被合并
fn local_path_for(root: &Path, rest: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in rest.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

/// 只有“不存在”类错误视为本地文件已删除，其余错误中止同步
async fn local_state(path: &Path) -> Result<LocalState> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(LocalState::File),
        Ok(_) => Ok(LocalState::Absent),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(LocalState::Absent)
        }
        Err(e) => Err(SyncError::read(path, e)),
    }
}
