//! Non-blocking adapter over [`Grid3`].
//!
//! Each call moves the blocking pipeline onto tokio's blocking pool. Pages of
//! a single filter still run one after another.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use crate::boundary::BoundaryResolver;
use crate::domain::{FilterArgs, OutputFormat, ServiceSummary};
use crate::error::GeodataError;
use crate::grid3::{FilterOutput, Grid3};
use crate::http::HttpGateway;
use crate::metadata::LayerMetadata;
use crate::preview::PreviewSink;

/// Runtime for callers that block on [`AsyncGrid3`] from plain threads.
pub struct WorkerRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl WorkerRuntime {
    pub fn new() -> Result<Self, GeodataError> {
        let runtime = Runtime::new()
            .map_err(|err| GeodataError::Worker(format!("start runtime: {err}")))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

pub struct AsyncGrid3<G: HttpGateway, B: BoundaryResolver, P: PreviewSink> {
    inner: Arc<Grid3<G, B, P>>,
}

impl<G: HttpGateway, B: BoundaryResolver, P: PreviewSink> Clone for AsyncGrid3<G, B, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, B, P> AsyncGrid3<G, B, P>
where
    G: HttpGateway + 'static,
    B: BoundaryResolver + 'static,
    P: PreviewSink + 'static,
{
    pub fn new(inner: Grid3<G, B, P>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn from_shared(inner: Arc<Grid3<G, B, P>>) -> Self {
        Self { inner }
    }

    pub async fn list_data(&self) -> Result<Vec<ServiceSummary>, GeodataError> {
        self.offload(|grid3| grid3.list_data()).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<ServiceSummary>, GeodataError> {
        let query = query.to_string();
        self.offload(move |grid3| grid3.search(&query)).await
    }

    pub async fn info(&self, name: &str) -> Result<LayerMetadata, GeodataError> {
        let name = name.to_string();
        self.offload(move |grid3| grid3.info(&name)).await
    }

    pub async fn filter(
        &self,
        name: &str,
        args: FilterArgs,
        format: OutputFormat,
    ) -> Result<FilterOutput, GeodataError> {
        let name = name.to_string();
        self.offload(move |grid3| grid3.filter(&name, args, format))
            .await
    }

    async fn offload<T, F>(&self, job: F) -> Result<T, GeodataError>
    where
        T: Send + 'static,
        F: FnOnce(&Grid3<G, B, P>) -> Result<T, GeodataError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || job(&*inner))
            .await
            .map_err(|err| GeodataError::Worker(format!("task panicked: {err}")))?
    }
}
