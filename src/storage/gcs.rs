use super::{
    ByteStream, EntryStream, RemoteEntry, RemoteObject, RemoteStore, IO_TIMEOUT_SECS,
    OP_TIMEOUT_SECS,
};
use crate::core::Fingerprint;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures::StreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;
use tracing::debug;

/// 基于 opendal 的 Google Cloud Storage 存储
pub struct GcsStore {
    operator: Operator,
    name: String,
}

impl GcsStore {
    pub fn new(bucket: &str, credential_path: &str) -> Result<Self> {
        use opendal::services::Gcs;

        let builder = Gcs::default()
            .bucket(bucket)
            .credential_path(credential_path);

        // 添加超时层
        let operator = Operator::new(builder)
            .map_err(|e| SyncError::BackendAuth {
                bucket: bucket.to_string(),
                source: e.into(),
            })?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        Ok(Self::from_operator(operator, format!("gs://{}", bucket)))
    }

    /// 使用已构建好的 operator（测试中使用内存服务）
    pub fn from_operator(operator: Operator, name: impl Into<String>) -> Self {
        Self {
            operator,
            name: name.into(),
        }
    }

    /// 启动时检查存储桶是否可访问
    pub async fn check(&self) -> Result<()> {
        self.operator
            .check()
            .await
            .map_err(|e| SyncError::BackendAuth {
                bucket: self.name.clone(),
                source: e.into(),
            })
    }
}

/// GCS 以 base64 形式返回 md5Hash
fn parse_md5(value: Option<&str>) -> Option<Fingerprint> {
    value.and_then(Fingerprint::from_base64)
}

#[async_trait]
impl RemoteStore for GcsStore {
    async fn object_attributes(&self, key: &str) -> Result<RemoteObject> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(RemoteObject {
                key: key.to_string(),
                fingerprint: parse_md5(meta.content_md5()),
                exists: true,
            }),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(RemoteObject::missing(key)),
            Err(e) => Err(SyncError::backend("stat", key, e)),
        }
    }

    async fn list_under_prefix(&self, prefix: &str) -> Result<EntryStream> {
        let path = if prefix.is_empty() { "/" } else { prefix };

        let lister = self
            .operator
            .lister_with(path)
            .recursive(true)
            .metakey(Metakey::Mode | Metakey::ContentMd5)
            .await
            .map_err(|e| SyncError::backend("list", prefix, e))?;

        let prefix = prefix.to_string();
        let entries = lister.map(move |item| {
            let entry = item.map_err(|e| SyncError::backend("list", prefix.clone(), e))?;
            Ok(RemoteEntry {
                key: entry.path().trim_start_matches('/').to_string(),
                fingerprint: parse_md5(entry.metadata().content_md5()),
            })
        });

        Ok(entries.boxed())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // 删除不存在的对象不会报错
        self.operator
            .delete(key)
            .await
            .map_err(|e| SyncError::backend("delete", key, e))
    }

    async fn upload(
        &self,
        key: &str,
        mut data: ByteStream,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut request = self.operator.writer_with(key);
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        let mut writer = request
            .await
            .map_err(|e| SyncError::backend("upload", key, e))?;

        while let Some(chunk) = data.next().await {
            let written = match chunk {
                Ok(bytes) => writer
                    .write(bytes)
                    .await
                    .map_err(|e| SyncError::backend("upload", key, e)),
                Err(e) => Err(SyncError::backend("upload", key, e)),
            };
            if let Err(e) = written {
                // 放弃未提交的写入，远端保持原对象
                if let Err(abort_err) = writer.abort().await {
                    debug!("abort upload {} failed: {}", key, abort_err);
                }
                return Err(e);
            }
        }

        writer
            .close()
            .await
            .map_err(|e| SyncError::backend("upload", key, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
