pub mod engine;
pub mod events;
pub mod fingerprint;
pub mod key;
pub mod reaper;
pub mod upload;

pub use engine::{normalize_source, ExecutionMode, SyncConfig, SyncEngine, SyncReport, MAX_CONCURRENT_UPLOADS};
pub use events::{EventSink, SyncEvent};
pub use fingerprint::{file_fingerprint, Fingerprint};
pub use key::DestinationKey;
pub use reaper::OrphanReaper;
pub use upload::{content_type_for, LocalEntry, SyncTask, UploadGate, UploadOutcome};
