use clap::error::ErrorKind;
use clap::Parser;
use gcssync::config::{AppConfig, Credentials, RemoteUri};
use gcssync::core::{normalize_source, SyncConfig, MAX_CONCURRENT_UPLOADS};
use gcssync::logging::{init_logging, LOG_LEVEL_VAR};
use gcssync::{GcsStore, SyncEngine, SyncError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// 把本地目录单向同步到 Google Cloud Storage
#[derive(Debug, Parser)]
#[command(name = "gcssync", version, about)]
struct Cli {
    /// 本地源目录
    local_path: PathBuf,

    /// 目标地址 gs://<bucket>/<path>
    remote_uri: String,

    /// 并行上传
    #[arg(long)]
    parallel: bool,

    /// 并行上传数（隐含 --parallel）
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// JSON 配置文件
    #[arg(long, value_name = "FILE", env = "GCSSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// 提高日志级别（-v debug, -vv trace）
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn show_error(msg: impl std::fmt::Display) {
    eprintln!("{}", msg);
}

fn usage_lines() -> Vec<String> {
    vec![
        format!("gcssync version: {}", env!("CARGO_PKG_VERSION")),
        "Usage:".to_string(),
        "gcssync local_path gs://[bucket name]/path".to_string(),
    ]
}

fn usage() {
    for line in usage_lines() {
        println!("{}", line);
    }
}

/// 启动参数检查失败时要打印的内容：错误在 stderr，URI 不合法时再在 stdout 打印用法
fn startup_failure(errors: &[SyncError], uri_invalid: bool) -> (Vec<String>, Vec<String>) {
    let diagnostics = errors.iter().map(|e| e.to_string()).collect();
    let usage = if uri_invalid { usage_lines() } else { Vec::new() };
    (diagnostics, usage)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            usage();
            return ExitCode::FAILURE;
        }
    };

    let mut app_config = match cli.config.as_deref().map(AppConfig::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            show_error(e);
            return ExitCode::FAILURE;
        }
    };

    app_config
        .log
        .resolve_level(cli.verbose, std::env::var(LOG_LEVEL_VAR).ok());
    init_logging(&app_config.log);

    let sync_config = match cli.jobs {
        Some(n) => SyncConfig {
            buffer_size: app_config.sync.buffer_size,
            ..SyncConfig::parallel(n)
        },
        None if cli.parallel => SyncConfig {
            buffer_size: app_config.sync.buffer_size,
            ..SyncConfig::parallel(MAX_CONCURRENT_UPLOADS)
        },
        None => app_config.sync,
    };

    // 参数和环境变量的错误一起报告
    let mut errors: Vec<SyncError> = Vec::new();
    let uri = RemoteUri::parse(&cli.remote_uri)
        .map_err(|e| errors.push(e))
        .ok();
    let credentials = Credentials::from_env()
        .map_err(|e| errors.extend(e))
        .ok();

    let uri_invalid = uri.is_none();

    let (Some(uri), Some(credentials)) = (uri, credentials) else {
        let (diagnostics, usage) = startup_failure(&errors, uri_invalid);
        for line in diagnostics {
            show_error(line);
        }
        for line in usage {
            println!("{}", line);
        }
        return ExitCode::FAILURE;
    };

    let store = match connect(&uri, &credentials).await {
        Ok(store) => store,
        Err(e) => {
            show_error(format!("{:#}", e));
            show_error("Cannot create GCSBucket object");
            return ExitCode::FAILURE;
        }
    };

    let source = normalize_source(&cli.local_path);
    let engine = SyncEngine::with_config(store, sync_config);
    match engine.sync_tree(&source, &uri.path).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            show_error(e);
            ExitCode::FAILURE
        }
    }
}

async fn connect(uri: &RemoteUri, credentials: &Credentials) -> anyhow::Result<Arc<GcsStore>> {
    use anyhow::Context;

    tracing::debug!(
        "连接存储桶: gs://{} (project={})",
        uri.bucket,
        credentials.project_id
    );
    let store = GcsStore::new(&uri.bucket, &credentials.credential_path)
        .with_context(|| format!("初始化 GCS 客户端失败: {}", uri.bucket))?;
    store.check().await?;
    Ok(Arc::new(store))
}
