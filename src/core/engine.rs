use crate::core::events::{EventSink, SyncEvent};
use crate::core::fingerprint::HASH_BUFFER_SIZE;
use crate::core::key::DestinationKey;
use crate::core::reaper::OrphanReaper;
use crate::core::upload::{LocalEntry, SyncTask, UploadGate, UploadOutcome};
use crate::error::{Result, SyncError};
use crate::storage::RemoteStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 默认并行上传数
pub const MAX_CONCURRENT_UPLOADS: usize = 4;

/// 执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum ExecutionMode {
    /// 逐个上传，任何失败立即中止
    Sequential,
    /// 同时最多 `max_concurrent` 个上传
    #[serde(rename_all = "camelCase")]
    Parallel { max_concurrent: usize },
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default = "default_mode")]
    pub mode: ExecutionMode,
    /// 读文件/计算指纹的缓冲大小（字节）
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Sequential
}

fn default_buffer_size() -> usize {
    HASH_BUFFER_SIZE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl SyncConfig {
    pub fn parallel(max_concurrent: usize) -> Self {
        Self {
            mode: ExecutionMode::Parallel {
                max_concurrent: max_concurrent.max(1),
            },
            ..Self::default()
        }
    }
}

/// 同步结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub directories: u64,
    pub uploaded: u64,
    pub unchanged: u64,
    pub deleted: u64,
}

impl SyncReport {
    fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded => self.uploaded += 1,
            UploadOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// 正在处理的上传任务
enum Dispatcher {
    Sequential,
    Parallel {
        semaphore: Arc<Semaphore>,
        tasks: JoinSet<Result<UploadOutcome>>,
    },
}

/// 同步引擎：先删除孤儿对象，再遍历目录树上传
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    config: SyncConfig,
    events: EventSink,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            config: SyncConfig::default(),
            events: EventSink::tracing(),
        }
    }

    pub fn with_config(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            events: EventSink::tracing(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// 把 `source` 目录同步到 `dest_prefix` 前缀下
    pub async fn sync_tree(&self, source: &Path, dest_prefix: &str) -> Result<SyncReport> {
        let root_key = DestinationKey::root(dest_prefix);

        // 根目录不可读时不能做孤儿检查，否则会删掉整个前缀
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|e| SyncError::traversal(source, e))?;
        if !meta.is_dir() {
            return Err(SyncError::traversal(
                source,
                std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            ));
        }

        info!(
            "开始同步: {} -> {}/{} ({:?})",
            source.display(),
            self.store.name(),
            root_key,
            self.config.mode
        );

        let mut report = SyncReport::default();

        // 删除阶段必须在任何上传开始前完成
        let reaper = OrphanReaper::new(self.store.clone(), self.events.clone());
        report.deleted = reaper.reap(&root_key, source).await?;

        let gate = UploadGate::new(
            self.store.clone(),
            self.events.clone(),
            self.config.buffer_size,
        );
        let mut dispatcher = match self.config.mode {
            ExecutionMode::Sequential => Dispatcher::Sequential,
            ExecutionMode::Parallel { max_concurrent } => Dispatcher::Parallel {
                semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
                tasks: JoinSet::new(),
            },
        };

        // 深度优先：当前目录的文件全部派发后再进入子目录
        let mut pending = vec![LocalEntry {
            path: source.to_path_buf(),
            relative: String::new(),
        }];

        while let Some(dir) = pending.pop() {
            let key = root_key.join(&dir.relative);
            let (files, subdirs) = read_directory(&dir).await?;
            report.directories += 1;

            self.events.emit(SyncEvent::Directory {
                path: dir.path.clone(),
                key: key.to_string(),
                entries: files.len() + subdirs.len(),
            });

            for entry in files {
                let task = SyncTask {
                    key: root_key.join(&entry.relative),
                    entry,
                };
                match &mut dispatcher {
                    Dispatcher::Sequential => {
                        report.record(gate.run(&task).await?);
                    }
                    Dispatcher::Parallel { semaphore, tasks } => {
                        let permit = semaphore.clone().acquire_owned().await?;
                        let gate = gate.clone();
                        tasks.spawn(async move {
                            let result = gate.run(&task).await;
                            drop(permit);
                            result
                        });
                        // 尽早发现失败的任务
                        while let Some(joined) = tasks.try_join_next() {
                            report.record(joined??);
                        }
                    }
                }
            }

            // 逆序入栈，保持目录项的原始顺序
            pending.extend(subdirs.into_iter().rev());
        }

        if let Dispatcher::Parallel { mut tasks, .. } = dispatcher {
            while let Some(joined) = tasks.join_next().await {
                report.record(joined??);
            }
        }

        debug!("同步完成: {:?}", report);
        Ok(report)
    }
}

/// 读取一个目录，按文件系统返回的顺序分成文件和子目录
async fn read_directory(dir: &LocalEntry) -> Result<(Vec<LocalEntry>, Vec<LocalEntry>)> {
    let traversal_err = |e| SyncError::traversal(&dir.path, e);

    let mut reader = tokio::fs::read_dir(&dir.path).await.map_err(traversal_err)?;
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    while let Some(item) = reader.next_entry().await.map_err(traversal_err)? {
        let file_name = item.file_name();
        let Some(name) = file_name.to_str() else {
            warn!("跳过非 UTF-8 文件名: {}", item.path().display());
            continue;
        };
        let file_type = item.file_type().await.map_err(traversal_err)?;

        let relative = if dir.relative.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir.relative, name)
        };
        let entry = LocalEntry {
            path: item.path(),
            relative,
        };

        if file_type.is_dir() {
            subdirs.push(entry);
        } else if file_type.is_file() {
            files.push(entry);
        } else {
            debug!("跳过非普通文件: {}", entry.path.display());
        }
    }

    Ok((files, subdirs))
}

/// 把路径参数末尾的分隔符去掉（根目录除外）
pub fn normalize_source(path: &Path) -> PathBuf {
    path.components().collect()
}
