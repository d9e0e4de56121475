mod download;
mod entity;
mod handle;
mod loader;
mod registry;
mod relation;
mod types;

pub use download::{default_cache_dir, resolve_model_files};
pub use entity::EntityModel;
pub use handle::ModelHandle;
pub use loader::ModelArtifacts;
pub use registry::ModelRegistry;
pub use relation::RelationModel;
pub use types::{
    Entity, EntityMode, ExtractRequest, ModelFiles, ModelKind, ModelMetadata, Relation,
    RelationSchemaEntry,
};
