//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use docflow_engine::EngineRegistry;
use docflow_queue::TaskQueue;

use crate::auth::AuthProvider;
use crate::images::ImageUploader;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Shared directory where inbound uploads land, reachable by workers
    pub upload_dir: PathBuf,
    /// Root directory of per-task result directories
    pub output_root: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub queue: TaskQueue,
    pub engines: Arc<EngineRegistry>,
    pub auth: Arc<dyn AuthProvider>,
    /// Present only when the object store is configured
    pub images: Option<Arc<ImageUploader>>,
    pub config: Arc<ApiConfig>,
}
