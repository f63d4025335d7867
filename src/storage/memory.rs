//! 测试用的内存存储，按 GCS 的方式报告 md5

use super::{ByteStream, EntryStream, RemoteEntry, RemoteObject, RemoteStore};
use crate::core::Fingerprint;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_uploads: Mutex<HashSet<String>>,
    fail_deletes: Mutex<HashSet<String>>,
    /// 列出这么多条后返回错误
    fail_list_after: Mutex<Option<usize>>,
    upload_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次上传人为延迟，用于观察并发
    pub fn with_upload_delay(delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: None,
            },
        );
    }

    pub fn fail_upload(&self, key: &str) {
        self.fail_uploads.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.fail_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_list_after(&self, entries: usize) {
        *self.fail_list_after.lock().unwrap() = Some(entries);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn object_attributes(&self, key: &str) -> Result<RemoteObject> {
        Ok(match self.objects.lock().unwrap().get(key) {
            Some(obj) => RemoteObject {
                key: key.to_string(),
                fingerprint: Some(Fingerprint::of_bytes(&obj.data)),
                exists: true,
            },
            None => RemoteObject::missing(key),
        })
    }

    async fn list_under_prefix(&self, prefix: &str) -> Result<EntryStream> {
        let mut entries: Vec<Result<RemoteEntry>> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| {
                Ok(RemoteEntry {
                    key: key.clone(),
                    fingerprint: Some(Fingerprint::of_bytes(&obj.data)),
                })
            })
            .collect();
        let fail_after = *self.fail_list_after.lock().unwrap();
        if let Some(n) = fail_after {
            entries.truncate(n);
            entries.push(Err(SyncError::backend("list", prefix, "injected failure")));
        }
        Ok(futures::stream::iter(entries).boxed())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let injected = self.fail_deletes.lock().unwrap().contains(key);
        if injected {
            return Err(SyncError::backend("delete", key, "injected failure"));
        }
        self.deletes.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn upload(&self, key: &str, data: ByteStream, content_type: Option<&str>) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = async {
            if let Some(delay) = self.upload_delay {
                tokio::time::sleep(delay).await;
            }
            let injected = self.fail_uploads.lock().unwrap().contains(key);
            if injected {
                return Err(SyncError::backend("upload", key, "injected failure"));
            }
            let chunks: Vec<bytes::Bytes> = data
                .try_collect()
                .await
                .map_err(|e| SyncError::backend("upload", key, e))?;
            Ok(chunks.concat())
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let data = result?;
        self.uploads.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
