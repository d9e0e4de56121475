use std::{
    ffi::c_void,
    path::Path,
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    error::GlineError,
    ffi::{NativeApi, marshal::path_to_cstring},
    model::ModelKind,
};

/// Pointer to a native model instance; `None` once closed.
struct NativeModel(Option<NonNull<c_void>>);

// The pointer is only dereferenced by the native layer while the owning
// handle's lock is held.
unsafe impl Send for NativeModel {}

/// Sole owner of one native model instance.
///
/// Every native call goes through [`ModelHandle::with_live`], which holds
/// the handle's lock for the duration of the call. `close` takes the same
/// lock, so a model is never freed while an inference on it is running.
/// The closed flag is readable without the lock.
pub struct ModelHandle {
    kind: ModelKind,
    api: Arc<dyn NativeApi>,
    native: Mutex<NativeModel>,
    // Written only under `native`.
    closed: AtomicBool,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ModelHandle {
    pub fn open(
        api: Arc<dyn NativeApi>,
        kind: ModelKind,
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, GlineError> {
        let model = path_to_cstring(model_path)?;
        let tokenizer = path_to_cstring(tokenizer_path)?;

        let raw = unsafe { api.new_model(kind, model.as_ptr(), tokenizer.as_ptr()) };
        let ptr = NonNull::new(raw).ok_or(GlineError::ModelCreation(kind))?;

        info!(
            %kind,
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            "native model created"
        );
        Ok(Self {
            kind,
            api,
            native: Mutex::new(NativeModel(Some(ptr))),
            closed: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Frees the native model. Closing an already closed handle does nothing.
    pub fn close(&self) {
        let mut native = self.native.lock();
        if let Some(ptr) = native.0.take() {
            self.closed.store(true, Ordering::Release);
            unsafe { self.api.free_model(self.kind, ptr.as_ptr()) };
            info!(kind = %self.kind, "native model closed");
        } else {
            debug!(kind = %self.kind, "close on closed model ignored");
        }
    }

    /// Runs `f` with the live native pointer while holding the handle lock.
    pub(crate) fn with_live<T>(
        &self,
        f: impl FnOnce(&dyn NativeApi, *mut c_void) -> Result<T, GlineError>,
    ) -> Result<T, GlineError> {
        let native = self.native.lock();
        let ptr = native.0.ok_or(GlineError::ModelClosed)?;
        f(self.api.as_ref(), ptr.as_ptr())
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.close();
    }
}
