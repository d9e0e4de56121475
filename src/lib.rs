pub mod config;
pub mod error;
pub mod ffi;
pub mod mcp;
pub mod model;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::{AppConfig, Transport};
pub use error::GlineError;
pub use mcp::McpServer;
pub use model::{
    Entity, EntityMode, EntityModel, ModelKind, ModelRegistry, Relation, RelationModel,
    RelationSchemaEntry,
};
pub use server::build_router;
