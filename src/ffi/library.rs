use std::{
    env,
    ffi::{c_char, c_void},
    fs::File,
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use flate2::read::GzDecoder;
use libloading::Library;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    error::GlineError,
    ffi::{
        native::NativeApi,
        platform::{Platform, resolve_artifact},
        types::{
            AddRelationSchemaFn, BatchRelationResult, BatchResult, FreeBatchResultFn,
            FreeModelFn, FreeRelationResultFn, InferenceFn, InferenceRelationFn, NewModelFn,
        },
    },
    model::{EntityMode, ModelKind},
};

static LIBRARY: OnceCell<Arc<LoadedLibrary>> = OnceCell::new();

/// Loads the bundled library for the host platform once per process.
///
/// Artifacts are looked up under `GLINE_LIB_DIR`, falling back to the
/// crate's `lib/` directory. Later calls return the same library without
/// touching the filesystem.
pub fn initialize() -> Result<Arc<LoadedLibrary>, GlineError> {
    initialize_with(&LibraryLoader::from_env())
}

/// Like [`initialize`], with an explicit loader for the first call.
pub fn initialize_with(loader: &LibraryLoader) -> Result<Arc<LoadedLibrary>, GlineError> {
    load_once(&LIBRARY, || loader.load())
}

/// Runs `load` only while `cell` is empty. A failed load leaves it empty.
fn load_once<T>(
    cell: &OnceCell<Arc<T>>,
    load: impl FnOnce() -> Result<T, GlineError>,
) -> Result<Arc<T>, GlineError> {
    cell.get_or_try_init(|| load().map(Arc::new)).cloned()
}

/// The loaded library, if [`initialize`] has succeeded.
pub fn library() -> Result<Arc<LoadedLibrary>, GlineError> {
    LIBRARY.get().cloned().ok_or(GlineError::NotInitialized)
}

pub fn is_initialized() -> bool {
    LIBRARY.get().is_some()
}

#[derive(Debug, Clone)]
pub struct LibraryLoader {
    artifact_root: PathBuf,
    platform: Platform,
}

impl LibraryLoader {
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            artifact_root: artifact_root.into(),
            platform: Platform::host(),
        }
    }

    pub fn from_env() -> Self {
        let root = env::var("GLINE_LIB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_artifact_root());
        Self::new(root)
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn load(&self) -> Result<LoadedLibrary, GlineError> {
        let artifact = resolve_artifact(&self.platform)?;
        let source = self.artifact_root.join(artifact);
        let path = extract_artifact(&source)
            .map_err(|e| GlineError::LibraryInit(format!("extract {}: {e}", source.display())))?;
        info!(platform = %self.platform, path = %path.display(), "extracted native library");
        LoadedLibrary::open(path)
    }
}

pub fn default_artifact_root() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/lib"))
}

/// Copies `source` into a fresh private temp file, gunzipping `.gz` artifacts.
///
/// The file is kept on disk: the dynamic loader may map the library from it
/// for as long as the process runs.
pub fn extract_artifact(source: &Path) -> io::Result<PathBuf> {
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"))?;
    let compressed = file_name.ends_with(".gz");
    let library_name = file_name.trim_end_matches(".gz");

    let input = BufReader::new(File::open(source)?);
    let mut reader: Box<dyn Read> = if compressed {
        Box::new(GzDecoder::new(input))
    } else {
        Box::new(input)
    };

    let suffix = Path::new(library_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut staged = tempfile::Builder::new()
        .prefix("gline-rs-lib-")
        .suffix(&suffix)
        .tempfile()?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file_mut().flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))?;
    }

    let (_file, path) = staged.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[derive(Clone, Copy)]
struct EntryPoints {
    new_span_model: NewModelFn,
    inference_span: InferenceFn,
    free_span_model: FreeModelFn,
    new_token_model: NewModelFn,
    inference_token: InferenceFn,
    free_token_model: FreeModelFn,
    free_batch_result: FreeBatchResultFn,
    new_relation_model: NewModelFn,
    add_relation_schema: AddRelationSchemaFn,
    inference_relation: InferenceRelationFn,
    free_relation_model: FreeModelFn,
    free_relation_result: FreeRelationResultFn,
}

/// An opened native module with every entry point resolved.
pub struct LoadedLibrary {
    path: PathBuf,
    entry: EntryPoints,
    // Keeps the module mapped; the entry points above point into it.
    _library: Library,
}

impl std::fmt::Debug for LoadedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LoadedLibrary {
    pub fn open(path: PathBuf) -> Result<Self, GlineError> {
        let library = open_module(&path)
            .map_err(|e| GlineError::LibraryInit(format!("dlopen failed: {e}")))?;

        let entry = EntryPoints {
            new_span_model: symbol(&library, "new_span_model")?,
            inference_span: symbol(&library, "inference_span")?,
            free_span_model: symbol(&library, "free_span_model")?,
            new_token_model: symbol(&library, "new_token_model")?,
            inference_token: symbol(&library, "inference_token")?,
            free_token_model: symbol(&library, "free_token_model")?,
            free_batch_result: symbol(&library, "free_batch_result")?,
            new_relation_model: symbol(&library, "new_relation_model")?,
            add_relation_schema: symbol(&library, "add_relation_schema")?,
            inference_relation: symbol(&library, "inference_relation")?,
            free_relation_model: symbol(&library, "free_relation_model")?,
            free_relation_result: symbol(&library, "free_relation_result")?,
        };

        info!(path = %path.display(), "native library ready");
        Ok(Self {
            path,
            entry,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn open_module(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};
    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_module(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, GlineError> {
    let mut raw = name.as_bytes().to_vec();
    raw.push(0);
    unsafe { library.get::<T>(&raw) }
        .map(|sym| *sym)
        .map_err(|_| GlineError::LibraryInit(format!("symbol not found: {name}")))
}

impl NativeApi for LoadedLibrary {
    unsafe fn new_model(
        &self,
        kind: ModelKind,
        model_path: *const c_char,
        tokenizer_path: *const c_char,
    ) -> *mut c_void {
        let ctor = match kind {
            ModelKind::Span => self.entry.new_span_model,
            ModelKind::Token => self.entry.new_token_model,
            ModelKind::Relation => self.entry.new_relation_model,
        };
        unsafe { ctor(model_path, tokenizer_path) }
    }

    unsafe fn free_model(&self, kind: ModelKind, model: *mut c_void) {
        let dtor = match kind {
            ModelKind::Span => self.entry.free_span_model,
            ModelKind::Token => self.entry.free_token_model,
            ModelKind::Relation => self.entry.free_relation_model,
        };
        unsafe { dtor(model) }
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
        let infer = match mode {
            EntityMode::Span => self.entry.inference_span,
            EntityMode::Token => self.entry.inference_token,
        };
        unsafe { infer(model, inputs, input_count, labels, label_count) }
    }

    unsafe fn free_batch_result(&self, result: *mut BatchResult) {
        unsafe { (self.entry.free_batch_result)(result) }
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
        unsafe {
            (self.entry.add_relation_schema)(
                model, relation, head_types, head_count, tail_types, tail_count,
            )
        }
    }

    unsafe fn inference_relation(
        &self,
        model: *mut c_void,
        inputs: *const *const c_char,
        input_count: usize,
        entity_labels: *const *const c_char,
        label_count: usize,
    ) -> *mut BatchRelationResult {
        unsafe {
            (self.entry.inference_relation)(model, inputs, input_count, entity_labels, label_count)
        }
    }

    unsafe fn free_relation_result(&self, result: *mut BatchRelationResult) {
        unsafe { (self.entry.free_relation_result)(result) }
    }
}
