//! Stub local-model client used when the `local-model` feature is disabled.

use super::{CompletionClient, CompletionError, CompletionRequest};
use async_trait::async_trait;
use std::path::PathBuf;

/// Placeholder for the embedded quantized-model client.
///
/// Reports the provider as unavailable so a misconfigured deployment fails
/// per-call instead of crashing the process.
pub struct LocalCompletionClient {
    model_path: PathBuf,
}

impl LocalCompletionClient {
    /// Construct a stub client; the path is only used for diagnostics.
    pub fn new(model_path: PathBuf) -> Self {
        Self { model_path }
    }
}

#[async_trait]
impl CompletionClient for LocalCompletionClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::ProviderUnavailable(format!(
            "local model support not compiled in (enable the `local-model` feature to use {})",
            self.model_path.display()
        )))
    }
}
