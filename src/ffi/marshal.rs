use std::{
    ffi::{CString, c_char},
    path::Path,
};

use crate::error::GlineError;

/// An owned array of C strings plus the pointer table the native side reads.
///
/// The pointer table borrows from `strings`; both are released together
/// when the array is dropped, on every exit path.
#[derive(Debug)]
pub struct CStringArray {
    strings: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl CStringArray {
    pub fn new<S: AsRef<str>>(items: &[S]) -> Result<Self, GlineError> {
        let strings = items
            .iter()
            .map(|item| to_cstring(item.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let pointers = strings.iter().map(|s| s.as_ptr()).collect();
        Ok(Self { strings, pointers })
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.pointers.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

pub fn to_cstring(value: &str) -> Result<CString, GlineError> {
    CString::new(value).map_err(|_| {
        GlineError::Validation(format!("string contains an interior NUL byte: {value:?}"))
    })
}

pub fn path_to_cstring(path: &Path) -> Result<CString, GlineError> {
    to_cstring(&path.to_string_lossy())
}
