//! 应用配置模块

use crate::core::SyncConfig;
use crate::error::{Result, SyncError};
use crate::logging::LogConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 服务账号凭据文件
pub const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// 项目 ID
pub const PROJECT_ID_VAR: &str = "GOOGLE_PROJECT_ID";
/// 可选的 JSON 配置文件路径
pub const CONFIG_FILE_VAR: &str = "GCSSYNC_CONFIG";

/// 目标地址 `gs://<bucket>/<path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUri {
    pub bucket: String,
    pub path: String,
}

impl RemoteUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let re = Regex::new(r"^gs://([^/]+)/(.*)$")
            .map_err(|e| SyncError::Argument(e.to_string()))?;
        let caps = re
            .captures(uri)
            .ok_or_else(|| SyncError::Argument("Invalid Google Cloud Storage URI".to_string()))?;

        Ok(Self {
            bucket: caps[1].to_string(),
            path: caps[2].to_string(),
        })
    }
}

/// 从环境变量读取的凭据配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub credential_path: String,
    /// 启动时必须设置，但存储桶访问不使用它，只写入调试日志
    pub project_id: String,
}

impl Credentials {
    pub fn from_env() -> std::result::Result<Self, Vec<SyncError>> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 每个缺失（或为空）的变量都单独报告
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, Vec<SyncError>> {
        let fetch = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let credential_path = fetch(CREDENTIALS_VAR);
        let project_id = fetch(PROJECT_ID_VAR);

        match (credential_path, project_id) {
            (Some(credential_path), Some(project_id)) => Ok(Self {
                credential_path,
                project_id,
            }),
            (credential_path, project_id) => {
                let mut errors = Vec::new();
                if credential_path.is_none() {
                    errors.push(SyncError::Config(CREDENTIALS_VAR.to_string()));
                }
                if project_id.is_none() {
                    errors.push(SyncError::Config(PROJECT_ID_VAR.to_string()));
                }
                Err(errors)
            }
        }
    }
}

/// 可选配置文件内容，命令行参数优先
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::read(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            SyncError::Argument(format!("invalid config file {}: {}", path.display(), e))
        })
    }
}
