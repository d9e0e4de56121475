//! In-process stand-in for the native library.
//!
//! Allocates result buffers the way the real binding does (boxed arrays of
//! records holding owned C strings) and counts every call, so tests can
//! check that buffers and models are released exactly once.

use std::{
    ffi::{CStr, CString, c_char, c_void},
    path::PathBuf,
    ptr, slice,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    ffi::{
        native::NativeApi,
        types::{BatchRelationResult, BatchResult, FlatRelation, FlatSpan},
    },
    model::{
        EntityMode, EntityModel, ModelFiles, ModelKind, ModelMetadata, ModelRegistry,
        RelationSchemaEntry,
    },
};

#[derive(Debug, Clone)]
pub(crate) struct StubSpan {
    pub sequence_index: usize,
    pub label: &'static str,
    pub text: &'static str,
}

pub(crate) fn span(sequence_index: usize, label: &'static str, text: &'static str) -> StubSpan {
    StubSpan {
        sequence_index,
        label,
        text,
    }
}

struct StubModel {
    kind: ModelKind,
}

#[derive(Default)]
pub(crate) struct StubApi {
    pub fail_create: AtomicBool,
    pub fail_inference: AtomicBool,
    /// Adds one relation tagged with an out-of-range sequence index.
    pub emit_stray_relation: AtomicBool,
    pub models_created: AtomicUsize,
    pub models_freed: AtomicUsize,
    pub inference_calls: AtomicUsize,
    pub schema_calls: AtomicUsize,
    pub results_freed: AtomicUsize,
    spans: Mutex<Vec<StubSpan>>,
    schema: Mutex<Vec<RelationSchemaEntry>>,
    last_inputs: Mutex<Vec<String>>,
    last_mode: Mutex<Option<EntityMode>>,
    inference_delay: Mutex<Option<Duration>>,
}

impl StubApi {
    pub fn with_spans(spans: Vec<StubSpan>) -> Self {
        let stub = Self::default();
        *stub.spans.lock() = spans;
        stub
    }

    /// Makes every entity inference sleep for `delay` before answering.
    pub fn with_inference_delay(self, delay: Duration) -> Self {
        *self.inference_delay.lock() = Some(delay);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn native_schema(&self) -> Vec<RelationSchemaEntry> {
        self.schema.lock().clone()
    }

    pub fn last_inputs(&self) -> Vec<String> {
        self.last_inputs.lock().clone()
    }

    pub fn last_mode(&self) -> Option<EntityMode> {
        *self.last_mode.lock()
    }
}

unsafe fn read_array(items: *const *const c_char, count: usize) -> Vec<String> {
    if items.is_null() || count == 0 {
        return Vec::new();
    }
    unsafe { slice::from_raw_parts(items, count) }
        .iter()
        .map(|&item| unsafe { CStr::from_ptr(item) }.to_string_lossy().into_owned())
        .collect()
}

fn owned(value: &str) -> *mut c_char {
    CString::new(value).map(CString::into_raw).unwrap_or(ptr::null_mut())
}

unsafe fn free_owned(value: *mut c_char) {
    if !value.is_null() {
        drop(unsafe { CString::from_raw(value) });
    }
}

impl NativeApi for StubApi {
    unsafe fn new_model(
        &self,
        kind: ModelKind,
        model_path: *const c_char,
        tokenizer_path: *const c_char,
    ) -> *mut c_void {
        assert!(!model_path.is_null() && !tokenizer_path.is_null());
        if self.fail_create.load(Ordering::SeqCst) {
            return ptr::null_mut();
        }
        self.models_created.fetch_add(1, Ordering::SeqCst);
        Box::into_raw(Box::new(StubModel { kind })).cast()
    }

    unsafe fn free_model(&self, kind: ModelKind, model: *mut c_void) {
        let model = unsafe { Box::from_raw(model.cast::<StubModel>()) };
        assert_eq!(model.kind, kind, "destructor does not match constructor");
        self.models_freed.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn inference(
        &self,
        mode: EntityMode,
        model: *mut c_void,
        inputs: *const *const c_char,
        input_count: usize,
        labels: *const *const c_char,
        label_count: usize,
    ) -> *mut BatchResult {
        assert!(!model.is_null(), "inference on a null model");
        let model = unsafe { &*model.cast::<StubModel>() };
        assert_eq!(model.kind, ModelKind::from(mode));

        self.inference_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_inputs.lock() = unsafe { read_array(inputs, input_count) };
        *self.last_mode.lock() = Some(mode);
        let _labels = unsafe { read_array(labels, label_count) };

        let delay = *self.inference_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.fail_inference.load(Ordering::SeqCst) {
            return ptr::null_mut();
        }

        let spans: Vec<FlatSpan> = self
            .spans
            .lock()
            .iter()
            .enumerate()
            .map(|(i, s)| FlatSpan {
                sequence_index: s.sequence_index,
                start: i,
                end: i + s.text.len(),
                class: owned(s.label),
                text: owned(s.text),
                prob: 0.9,
            })
            .collect();
        let count = spans.len();
        let spans = Box::into_raw(spans.into_boxed_slice()).cast::<FlatSpan>();
        Box::into_raw(Box::new(BatchResult { spans, count }))
    }

    unsafe fn free_batch_result(&self, result: *mut BatchResult) {
        let result = unsafe { Box::from_raw(result) };
        let spans = unsafe {
            Box::from_raw(ptr::slice_from_raw_parts_mut(result.spans, result.count))
        };
        for span in spans.iter() {
            unsafe {
                free_owned(span.class);
                free_owned(span.text);
            }
        }
        self.results_freed.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn add_relation_schema(
        &self,
        model: *mut c_void,
        relation: *const c_char,
        head_types: *const *const c_char,
        head_count: usize,
        tail_types: *const *const c_char,
        tail_count: usize,
    ) {
        let model = unsafe { &*model.cast::<StubModel>() };
        assert_eq!(model.kind, ModelKind::Relation);

        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        let entry = RelationSchemaEntry {
            relation: unsafe { CStr::from_ptr(relation) }.to_string_lossy().into_owned(),
            head_types: unsafe { read_array(head_types, head_count) },
            tail_types: unsafe { read_array(tail_types, tail_count) },
        };
        self.schema.lock().push(entry);
    }

    unsafe fn inference_relation(
        &self,
        model: *mut c_void,
        inputs: *const *const c_char,
        input_count: usize,
        _entity_labels: *const *const c_char,
        _label_count: usize,
    ) -> *mut BatchRelationResult {
        let model = unsafe { &*model.cast::<StubModel>() };
        assert_eq!(model.kind, ModelKind::Relation);

        self.inference_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_inputs.lock() = unsafe { read_array(inputs, input_count) };

        if self.fail_inference.load(Ordering::SeqCst) {
            return ptr::null_mut();
        }

        // One relation per registered schema entry for every input text.
        let schema = self.schema.lock();
        let mut relations = Vec::new();
        for sequence_index in 0..input_count {
            for entry in schema.iter() {
                relations.push(FlatRelation {
                    sequence_index,
                    source: owned(&entry.head_types[0]),
                    target: owned(&entry.tail_types[0]),
                    relation: owned(&entry.relation),
                    prob: 0.8,
                });
            }
        }
        if self.emit_stray_relation.load(Ordering::SeqCst) {
            relations.push(FlatRelation {
                sequence_index: input_count,
                source: owned("stray"),
                target: owned("stray"),
                relation: owned("stray"),
                prob: 0.1,
            });
        }

        let count = relations.len();
        let relations = Box::into_raw(relations.into_boxed_slice()).cast::<FlatRelation>();
        Box::into_raw(Box::new(BatchRelationResult { relations, count }))
    }

    unsafe fn free_relation_result(&self, result: *mut BatchRelationResult) {
        let result = unsafe { Box::from_raw(result) };
        let relations = unsafe {
            Box::from_raw(ptr::slice_from_raw_parts_mut(
                result.relations,
                result.count,
            ))
        };
        for relation in relations.iter() {
            unsafe {
                free_owned(relation.source);
                free_owned(relation.target);
                free_owned(relation.relation);
            }
        }
        self.results_freed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A span-mode registry serving a model backed by `stub`.
pub(crate) fn stub_registry(stub: Arc<StubApi>) -> ModelRegistry {
    let files = ModelFiles {
        model_path: PathBuf::from("model.onnx"),
        tokenizer_path: PathBuf::from("tokenizer.json"),
    };
    let model = EntityModel::from_files(stub, EntityMode::Span, &files)
        .expect("stub model construction");
    let metadata = ModelMetadata {
        model_id: "stub/gliner".into(),
        kind: ModelKind::Span,
        files,
    };
    ModelRegistry::new(Arc::new(model), metadata, Duration::from_secs(5))
}
