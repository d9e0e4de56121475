use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Which native constructor produced a handle. Selects the matching
/// inference and destructor entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Span,
    Token,
    Relation,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Span => "span",
            ModelKind::Token => "token",
            ModelKind::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// The two variants that emit entity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityMode {
    Span,
    Token,
}

impl EntityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityMode::Span => "span",
            EntityMode::Token => "token",
        }
    }
}

impl From<EntityMode> for ModelKind {
    fn from(mode: EntityMode) -> Self {
        match mode {
            EntityMode::Span => ModelKind::Span,
            EntityMode::Token => ModelKind::Token,
        }
    }
}

impl FromStr for EntityMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "span" => Ok(EntityMode::Span),
            "token" => Ok(EntityMode::Token),
            other => Err(format!("unknown model mode '{other}', expected 'span' or 'token'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Position of the owning text in the input batch.
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub text: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub sequence_index: usize,
    pub source: String,
    pub target: String,
    pub relation: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSchemaEntry {
    pub relation: String,
    pub head_types: Vec<String>,
    pub tail_types: Vec<String>,
}

/// Local paths of the two artifacts a model constructor needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub kind: ModelKind,
    pub files: ModelFiles,
}
