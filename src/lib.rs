pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, Credentials, RemoteUri};
pub use core::{EventSink, ExecutionMode, SyncConfig, SyncEngine, SyncEvent, SyncReport};
pub use error::{Result, SyncError};
pub use storage::{GcsStore, RemoteStore};
