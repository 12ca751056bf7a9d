// state.rs - Shared handles passed to every handler
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::fetch::VideoFetcher;
use crate::mailer::ContactNotifier;
use crate::scanner::{MalwareScanner, ScanPolicy};
use crate::storage::ObjectStorage;
use crate::workspace::Workspace;

/// Adapters sit behind trait objects so tests can swap them out.
pub struct AppState {
    pub storage: Arc<dyn ObjectStorage>,
    pub scanner: Arc<dyn MalwareScanner>,
    pub fetcher: Arc<dyn VideoFetcher>,
    pub notifier: Arc<dyn ContactNotifier>,
    pub workspace: Workspace,
    pub scan_policy: ScanPolicy,
    pub signed_url_ttl: Duration,
    pub max_upload_bytes: u64,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        config: &Config,
        storage: Arc<dyn ObjectStorage>,
        scanner: Arc<dyn MalwareScanner>,
        fetcher: Arc<dyn VideoFetcher>,
        notifier: Arc<dyn ContactNotifier>,
        workspace: Workspace,
    ) -> Self {
        Self {
            storage,
            scanner,
            fetcher,
            notifier,
            workspace,
            scan_policy: ScanPolicy {
                enabled: config.scan_enabled,
                allow_unavailable: config.allow_unscanned_uploads,
            },
            signed_url_ttl: config.signed_url_ttl,
            max_upload_bytes: config.max_upload_bytes,
            cors_origins: config.cors_origins.clone(),
        }
    }
}
