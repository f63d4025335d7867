//! 内容指纹 - 用于判断文件是否变化，不依赖时间戳

use crate::error::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// 计算指纹时的读缓冲大小
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// 文件内容的 MD5，与 GCS 的 md5Hash 相同格式
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// 解析 GCS 返回的 base64 编码 md5Hash
    pub fn from_base64(value: &str) -> Option<Self> {
        let raw = STANDARD.decode(value.trim()).ok()?;
        let digest: [u8; 16] = raw.try_into().ok()?;
        Some(Self(digest))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// 流式计算本地文件的指纹
pub async fn file_fingerprint(path: &Path) -> Result<Fingerprint> {
    file_fingerprint_with_buffer(path, HASH_BUFFER_SIZE).await
}

pub async fn file_fingerprint_with_buffer(path: &Path, buffer_size: usize) -> Result<Fingerprint> {
    let read_err = |e| SyncError::read(path, e);

    let mut file = File::open(path).await.map_err(read_err)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let n = file.read(&mut buffer).await.map_err(read_err)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }

    Ok(Fingerprint(context.compute().0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let fp = Fingerprint::of_bytes(b"hello world");
        assert_eq!(fp.to_string(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(fp.to_base64(), "XrY7u+Ae7tCTyyK7j1rNww==");
        assert_eq!(Fingerprint::from_base64("XrY7u+Ae7tCTyyK7j1rNww=="), Some(fp));
    }

    #[test]
    fn test_rejects_wrong_length() {
        // 合法 base64，但不是 16 字节
        assert_eq!(Fingerprint::from_base64("aGVsbG8="), None);
    }

    #[tokio::test]
    async fn test_file_fingerprint_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        // 小缓冲区强制多次读取
        let streamed = file_fingerprint_with_buffer(&path, 1000).await.unwrap();
        assert_eq!(streamed, Fingerprint::of_bytes(&content));
        assert_eq!(file_fingerprint(&path).await.unwrap(), streamed);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_fingerprint(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Read { .. }));
    }
}
