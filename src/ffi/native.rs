use std::ffi::{c_char, c_void};

use crate::{
    ffi::types::{BatchRelationResult, BatchResult},
    model::{EntityMode, ModelKind},
};

/// The fixed set of native entry points a model handle talks to.
///
/// `LoadedLibrary` is the production implementation. Every method is a thin
/// forward to one entry point, so callers carry the usual FFI obligations:
/// pointers must be live, arrays must hold `count` valid C strings, and a
/// model pointer must come from `new_model` with the same `kind`.
pub trait NativeApi: Send + Sync {
    unsafe fn new_model(
        &self,
        kind: ModelKind,
        model_path: *const c_char,
        tokenizer_path: *const c_char,
    ) -> *mut c_void;

    unsafe fn free_model(&self, kind: ModelKind, model: *mut c_void);

    unsafe fn inference(
        &self,
        mode: EntityMode,
        model: *mut c_void,
        inputs: *const *const c_char,
        input_count: usize,
        labels: *const *const c_char,
        label_count: usize,
    ) -> *mut BatchResult;

    unsafe fn free_batch_result(&self, result: *mut BatchResult);

    unsafe fn add_relation_schema(
        &self,
        model: *mut c_void,
        relation: *const c_char,
        head_types: *const *const c_char,
        head_count: usize,
        tail_types: *const *const c_char,
        tail_count: usize,
    );

    unsafe fn inference_relation(
        &self,
        model: *mut c_void,
        inputs: *const *const c_char,
        input_count: usize,
        entity_labels: *const *const c_char,
        label_count: usize,
    ) -> *mut BatchRelationResult;

    unsafe fn free_relation_result(&self, result: *mut BatchRelationResult);
}
