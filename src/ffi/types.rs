//! Layouts and signatures shared with the native binding.
//!
//! Every record here is owned by the native side. The binding only reads
//! them between an inference call and the matching free call.

use std::ffi::{c_char, c_float, c_void};

#[repr(C)]
#[derive(Debug)]
pub struct FlatSpan {
    pub sequence_index: usize,
    pub start: usize,
    pub end: usize,
    pub class: *mut c_char,
    pub text: *mut c_char,
    pub prob: c_float,
}

#[repr(C)]
#[derive(Debug)]
pub struct BatchResult {
    pub spans: *mut FlatSpan,
    pub count: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct FlatRelation {
    pub sequence_index: usize,
    pub source: *mut c_char,
    pub target: *mut c_char,
    pub relation: *mut c_char,
    pub prob: c_float,
}

#[repr(C)]
#[derive(Debug)]
pub struct BatchRelationResult {
    pub relations: *mut FlatRelation,
    pub count: usize,
}

pub type NewModelFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut c_void;
pub type FreeModelFn = unsafe extern "C" fn(*mut c_void);
pub type InferenceFn = unsafe extern "C" fn(
    *mut c_void,
    *const *const c_char,
    usize,
    *const *const c_char,
    usize,
) -> *mut BatchResult;
pub type FreeBatchResultFn = unsafe extern "C" fn(*mut BatchResult);
pub type AddRelationSchemaFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    *const *const c_char,
    usize,
    *const *const c_char,
    usize,
);
pub type InferenceRelationFn = unsafe extern "C" fn(
    *mut c_void,
    *const *const c_char,
    usize,
    *const *const c_char,
    usize,
) -> *mut BatchRelationResult;
pub type FreeRelationResultFn = unsafe extern "C" fn(*mut BatchRelationResult);
