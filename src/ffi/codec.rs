//! Batch codec shared by every model variant.
//!
//! A native inference call returns one flat array of records, each tagged
//! with the index of the input text it belongs to. Decoding copies every
//! record into an owned value, buckets it by that index and frees the
//! native buffer before returning.

use std::{
    ffi::{CStr, c_char},
    ptr::NonNull,
    slice,
};

use tracing::{debug, warn};

use crate::{
    error::GlineError,
    ffi::{
        marshal::CStringArray,
        native::NativeApi,
        types::{BatchRelationResult, BatchResult, FlatRelation, FlatSpan},
    },
    model::{Entity, Relation},
};

/// A record inside a native result buffer.
pub trait FlatRecord {
    type Owned;

    fn sequence_index(&self) -> usize;

    /// Copies the record out of native memory.
    ///
    /// # Safety
    /// Every string pointer in the record must be null or a valid C string.
    unsafe fn to_owned_record(&self) -> Self::Owned;
}

/// A natively allocated result buffer with its matching free entry point.
pub trait NativeBatch {
    type Record: FlatRecord;

    /// # Safety
    /// `self` must be a buffer returned by the native layer and not yet freed.
    unsafe fn records(&self) -> &[Self::Record];

    /// # Safety
    /// `buffer` must come from the native layer and is invalid afterwards.
    unsafe fn release(api: &dyn NativeApi, buffer: *mut Self);
}

impl FlatRecord for FlatSpan {
    type Owned = Entity;

    fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    unsafe fn to_owned_record(&self) -> Entity {
        Entity {
            index: self.sequence_index,
            start: self.start,
            end: self.end,
            label: unsafe { read_cstr(self.class) },
            text: unsafe { read_cstr(self.text) },
            probability: self.prob,
        }
    }
}

impl NativeBatch for BatchResult {
    type Record = FlatSpan;

    unsafe fn records(&self) -> &[FlatSpan] {
        unsafe { raw_records(self.spans, self.count) }
    }

    unsafe fn release(api: &dyn NativeApi, buffer: *mut Self) {
        unsafe { api.free_batch_result(buffer) }
    }
}

impl FlatRecord for FlatRelation {
    type Owned = Relation;

    fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    unsafe fn to_owned_record(&self) -> Relation {
        Relation {
            sequence_index: self.sequence_index,
            source: unsafe { read_cstr(self.source) },
            target: unsafe { read_cstr(self.target) },
            relation: unsafe { read_cstr(self.relation) },
            probability: self.prob,
        }
    }
}

impl NativeBatch for BatchRelationResult {
    type Record = FlatRelation;

    unsafe fn records(&self) -> &[FlatRelation] {
        unsafe { raw_records(self.relations, self.count) }
    }

    unsafe fn release(api: &dyn NativeApi, buffer: *mut Self) {
        unsafe { api.free_relation_result(buffer) }
    }
}

/// Frees the wrapped native buffer exactly once, when dropped.
pub struct BatchGuard<'a, B: NativeBatch> {
    api: &'a dyn NativeApi,
    buffer: NonNull<B>,
}

impl<'a, B: NativeBatch> BatchGuard<'a, B> {
    /// Takes ownership of `raw`, or returns `None` for a null result.
    pub fn new(api: &'a dyn NativeApi, raw: *mut B) -> Option<Self> {
        NonNull::new(raw).map(|buffer| Self { api, buffer })
    }

    /// # Safety
    /// The native layer must have produced a well-formed buffer.
    pub unsafe fn records(&self) -> &[B::Record] {
        unsafe { self.buffer.as_ref().records() }
    }
}

impl<B: NativeBatch> Drop for BatchGuard<'_, B> {
    fn drop(&mut self) {
        unsafe { B::release(self.api, self.buffer.as_ptr()) }
    }
}

/// Buckets `records` into `batch_len` lists by sequence index, keeping the
/// native emission order inside each bucket. Records pointing past the batch
/// are discarded.
///
/// # Safety
/// See [`FlatRecord::to_owned_record`].
pub unsafe fn regroup<R: FlatRecord>(records: &[R], batch_len: usize) -> Vec<Vec<R::Owned>> {
    let mut buckets: Vec<Vec<R::Owned>> = (0..batch_len).map(|_| Vec::new()).collect();
    let mut discarded = 0usize;

    for record in records {
        match buckets.get_mut(record.sequence_index()) {
            Some(bucket) => bucket.push(unsafe { record.to_owned_record() }),
            None => discarded += 1,
        }
    }

    if discarded > 0 {
        warn!(
            discarded,
            batch_len, "dropped native records with out-of-range sequence index"
        );
    }
    buckets
}

/// Marshals `texts` and `labels`, runs `invoke` with the native arrays and
/// decodes whatever buffer it returns.
///
/// `invoke` receives `(inputs, input_count, labels, label_count)`. A null
/// buffer becomes `failure`.
pub fn run_batch<S, L, B, F>(
    api: &dyn NativeApi,
    texts: &[S],
    labels: &[L],
    failure: GlineError,
    invoke: F,
) -> Result<Vec<Vec<<B::Record as FlatRecord>::Owned>>, GlineError>
where
    S: AsRef<str>,
    L: AsRef<str>,
    B: NativeBatch,
    F: FnOnce(*const *const c_char, usize, *const *const c_char, usize) -> *mut B,
{
    let inputs = CStringArray::new(texts)?;
    let labels = CStringArray::new(labels)?;

    let raw = invoke(inputs.as_ptr(), inputs.len(), labels.as_ptr(), labels.len());
    let guard = BatchGuard::new(api, raw).ok_or(failure)?;

    let records = unsafe { guard.records() };
    debug!(
        texts = inputs.len(),
        records = records.len(),
        "decoding native batch"
    );
    Ok(unsafe { regroup(records, inputs.len()) })
}

unsafe fn raw_records<'a, T>(ptr: *const T, count: usize) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr, count) }
    }
}

unsafe fn read_cstr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}
