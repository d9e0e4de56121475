use std::sync::Arc;

use tracing::info;

use crate::{
    config::AppConfig,
    error::GlineError,
    ffi,
    model::{EntityModel, ModelMetadata, download::resolve_model_files},
};

/// Everything the server needs from startup: the loaded native library and
/// one entity model resolved from the configured hub identifier.
pub struct ModelArtifacts {
    pub model: Arc<EntityModel>,
    pub metadata: ModelMetadata,
}

impl ModelArtifacts {
    pub fn load(config: &AppConfig) -> Result<Self, GlineError> {
        let loader = ffi::LibraryLoader::new(&config.library_dir);
        let library = ffi::initialize_with(&loader)?;
        info!(path = %library.path().display(), "native library initialized");

        let files = resolve_model_files(&config.model_id, config.cache_dir.as_deref())?;
        let model = EntityModel::from_files(library, config.mode, &files)?;

        let metadata = ModelMetadata {
            model_id: config.model_id.clone(),
            kind: model.kind(),
            files,
        };
        Ok(Self {
            model: Arc::new(model),
            metadata,
        })
    }
}
