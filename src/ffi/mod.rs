//! Binding to the native GLiNER engine.
//!
//! The engine ships as a compressed shared library per platform. It is
//! extracted and opened once per process; model handles then talk to it
//! through the [`NativeApi`] entry-point table.

pub mod codec;
mod library;
pub mod marshal;
mod native;
pub mod platform;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use library::{
    LibraryLoader, LoadedLibrary, default_artifact_root, extract_artifact, initialize,
    initialize_with, is_initialized, library,
};
pub use native::NativeApi;
pub use platform::{Platform, resolve_artifact};
