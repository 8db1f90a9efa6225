// ABOUTME: Lazily connected, memoized runtime client.
// ABOUTME: The first successful connection wins; failed attempts are retried on the next call.

use super::bollard::BollardRuntime;
use super::error::{ConnectSnafu, EndpointSnafu, RuntimeError};
use crate::provider::{EngineEndpoint, ProviderError};
use snafu::ResultExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Holds at most one connected runtime for the life of the process.
#[derive(Default)]
pub struct RuntimeClient {
    runtime: OnceCell<Arc<BollardRuntime>>,
}

impl RuntimeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already connected runtime.
    pub fn with_runtime(runtime: BollardRuntime) -> Self {
        Self {
            runtime: OnceCell::new_with(Some(Arc::new(runtime))),
        }
    }

    /// Return the memoized runtime, resolving `endpoint` and connecting on
    /// first use.
    pub async fn get<F, Fut>(&self, endpoint: F) -> Result<Arc<BollardRuntime>, RuntimeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EngineEndpoint, ProviderError>>,
    {
        self.runtime
            .get_or_try_init(|| async {
                let endpoint = endpoint().await.context(EndpointSnafu)?;
                let url = endpoint.url();
                tracing::debug!(%url, "connecting to engine");
                let runtime = BollardRuntime::connect(&endpoint).context(ConnectSnafu { url })?;
                Ok(Arc::new(runtime))
            })
            .await
            .cloned()
    }

    /// Whether a runtime has been connected yet.
    pub fn is_connected(&self) -> bool {
        self.runtime.initialized()
    }
}
