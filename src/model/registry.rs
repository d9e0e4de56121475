use std::{sync::Arc, time::Duration};

use tokio::{task, time};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::GlineError,
    model::{Entity, EntityModel, ExtractRequest, ModelMetadata, loader::ModelArtifacts},
};

/// Owns the served model and runs inference off the async runtime.
pub struct ModelRegistry {
    model: Arc<EntityModel>,
    metadata: ModelMetadata,
    request_timeout: Duration,
}

impl ModelRegistry {
    pub fn initialize(config: &AppConfig) -> Result<Self, GlineError> {
        let artifacts = ModelArtifacts::load(config)?;
        Ok(Self::new(
            artifacts.model,
            artifacts.metadata,
            config.request_timeout,
        ))
    }

    pub fn new(model: Arc<EntityModel>, metadata: ModelMetadata, request_timeout: Duration) -> Self {
        Self {
            model,
            metadata,
            request_timeout,
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }

    pub fn is_ready(&self) -> bool {
        !self.model.is_closed()
    }

    /// Extracts entities from a single text. Blank text is rejected with
    /// `BadRequest` before reaching the model.
    ///
    /// The native call runs on a blocking worker. When the request timeout
    /// elapses the caller gets an error; the worker still runs to completion.
    pub async fn extract_entities(
        &self,
        request: ExtractRequest,
    ) -> Result<Vec<Entity>, GlineError> {
        let ExtractRequest { text, labels } = request;
        if text.trim().is_empty() {
            return Err(GlineError::BadRequest("text must not be empty".into()));
        }
        let model = Arc::clone(&self.model);
        debug!(chars = text.len(), labels = labels.len(), "extract request");

        let worker = task::spawn_blocking(move || model.predict(&[text], labels.as_slice()));
        let mut batches = time::timeout(self.request_timeout, worker)
            .await
            .map_err(|_| GlineError::InferenceTimeout(self.request_timeout))?
            .map_err(|err| GlineError::Worker(err.to_string()))??;

        Ok(batches.pop().unwrap_or_default())
    }

    /// Closes the served model; later requests fail with `ModelClosed`.
    pub fn shutdown(&self) {
        self.model.close();
    }
}
