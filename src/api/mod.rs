//! HTTP presentation layer
//!
//! Serves the upload page plus JSON and download endpoints backed by a shared
//! [`TranscriptionPipeline`].

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::pipeline::TranscriptionPipeline;

pub mod handlers;
pub mod models;
pub mod server;

pub use server::build_router;

/// API Server for handling upload and transcription requests
pub struct ApiServer {
    pipeline: Arc<TranscriptionPipeline>,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(pipeline: Arc<TranscriptionPipeline>, host: impl Into<String>, port: u16) -> Self {
        Self {
            pipeline,
            host: host.into(),
            port,
        }
    }

    /// Serve until the listener fails
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.port);
        server::start_http_server(self.pipeline, &self.host, self.port).await
    }
}
