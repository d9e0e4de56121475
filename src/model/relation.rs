use std::{path::Path, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    error::GlineError,
    ffi::{
        self, NativeApi,
        codec::run_batch,
        marshal::{CStringArray, to_cstring},
    },
    model::{
        ModelFiles, ModelKind, Relation, RelationSchemaEntry, download::resolve_model_files,
        handle::ModelHandle,
    },
};

/// A relation-extraction model and the schema registered on it.
///
/// The native side runs entity recognition before relation extraction, so
/// [`RelationModel::predict`] takes the entity label vocabulary as well.
#[derive(Debug)]
pub struct RelationModel {
    handle: ModelHandle,
    schema: Mutex<Vec<RelationSchemaEntry>>,
}

impl RelationModel {
    pub fn new(model_path: &Path, tokenizer_path: &Path) -> Result<Self, GlineError> {
        Self::with_api(ffi::library()?, model_path, tokenizer_path)
    }

    pub fn from_hub(model_id: &str) -> Result<Self, GlineError> {
        let api = ffi::library()?;
        let files = resolve_model_files(model_id, None)?;
        Self::from_files(api, &files)
    }

    pub fn from_files(api: Arc<dyn NativeApi>, files: &ModelFiles) -> Result<Self, GlineError> {
        Self::with_api(api, &files.model_path, &files.tokenizer_path)
    }

    pub fn with_api(
        api: Arc<dyn NativeApi>,
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, GlineError> {
        let handle = ModelHandle::open(api, ModelKind::Relation, model_path, tokenizer_path)?;
        Ok(Self {
            handle,
            schema: Mutex::new(Vec::new()),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn close(&self) {
        self.handle.close();
    }

    /// Every schema entry registered so far, oldest first.
    pub fn schema(&self) -> Vec<RelationSchemaEntry> {
        self.schema.lock().clone()
    }

    /// Registers `relation` as holding between `head_types` and `tail_types`.
    ///
    /// Additions accumulate; inference uses all of them.
    pub fn add_relation_schema<H, T>(
        &self,
        relation: &str,
        head_types: &[H],
        tail_types: &[T],
    ) -> Result<(), GlineError>
    where
        H: AsRef<str>,
        T: AsRef<str>,
    {
        self.handle.with_live(|api, model| {
            if head_types.is_empty() || tail_types.is_empty() {
                return Err(GlineError::Validation(
                    "head/tail types cannot be empty".into(),
                ));
            }

            let name = to_cstring(relation)?;
            let heads = CStringArray::new(head_types)?;
            let tails = CStringArray::new(tail_types)?;

            unsafe {
                api.add_relation_schema(
                    model,
                    name.as_ptr(),
                    heads.as_ptr(),
                    heads.len(),
                    tails.as_ptr(),
                    tails.len(),
                );
            }

            let entry = RelationSchemaEntry {
                relation: relation.to_string(),
                head_types: head_types.iter().map(|s| s.as_ref().to_string()).collect(),
                tail_types: tail_types.iter().map(|s| s.as_ref().to_string()).collect(),
            };
            debug!(relation = %entry.relation, "relation schema entry added");
            self.schema.lock().push(entry);
            Ok(())
        })
    }

    /// Extracts relations for every text in `texts`, one list per text.
    pub fn predict<S, L>(
        &self,
        texts: &[S],
        entity_labels: &[L],
    ) -> Result<Vec<Vec<Relation>>, GlineError>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        self.handle.with_live(|api, model| {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            if self.schema.lock().is_empty() {
                warn!("relation inference with an empty schema");
            }
            run_batch(
                api,
                texts,
                entity_labels,
                GlineError::InferenceFailed(ModelKind::Relation),
                |inputs, input_count, labels, label_count| unsafe {
                    api.inference_relation(model, inputs, input_count, labels, label_count)
                },
            )
        })
    }
}
