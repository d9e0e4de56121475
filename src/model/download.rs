use std::path::{Path, PathBuf};

use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use tracing::{info, warn};

use crate::{error::GlineError, model::ModelFiles};

const MODEL_CANDIDATES: &[&str] = &["model.onnx", "onnx/model.onnx"];
const TOKENIZER_FILE: &str = "tokenizer.json";

/// `~/.cache/gline-rs`, or `./.cache/gline-rs` without a home directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("gline-rs")
}

/// Fetches the ONNX model and tokenizer for `model_id` from the Hugging
/// Face hub, reusing files already present in the cache.
pub fn resolve_model_files(
    model_id: &str,
    cache_dir: Option<&Path>,
) -> Result<ModelFiles, GlineError> {
    let cache_dir = cache_dir.map(Path::to_path_buf).unwrap_or_else(default_cache_dir);
    info!(model_id, cache = %cache_dir.display(), "resolving model files");

    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .with_progress(false)
        .build()
        .map_err(|e| GlineError::Download(e.to_string()))?;
    let repo = api.model(model_id.to_string());

    let model_path = fetch_model(&repo, model_id)?;
    let tokenizer_path = repo
        .get(TOKENIZER_FILE)
        .map_err(|e| GlineError::Download(format!("{TOKENIZER_FILE}: {e}")))?;

    Ok(ModelFiles {
        model_path,
        tokenizer_path,
    })
}

fn fetch_model(repo: &ApiRepo, model_id: &str) -> Result<PathBuf, GlineError> {
    for candidate in MODEL_CANDIDATES {
        match repo.get(candidate) {
            Ok(path) => return Ok(path),
            Err(e) => warn!(model_id, candidate, error = %e, "model artifact not available"),
        }
    }
    Err(GlineError::IncompatibleModel {
        model_id: model_id.to_string(),
        reason: format!(
            "none of {} found; the repository must contain an ONNX export",
            MODEL_CANDIDATES.join(", ")
        ),
    })
}
