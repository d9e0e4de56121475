use std::{env, fmt};

use crate::error::GlineError;

/// Operating system and processor architecture, named the way
/// `std::env::consts` names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn host() -> Self {
        Self::new(env::consts::OS, env::consts::ARCH)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

struct ArtifactRow {
    os: &'static str,
    /// `None` matches every architecture (universal binary).
    arch: Option<&'static str>,
    path: &'static str,
}

const ARTIFACTS: &[ArtifactRow] = &[
    ArtifactRow {
        os: "macos",
        arch: None,
        path: "darwin/libgline_binding.dylib.gz",
    },
    ArtifactRow {
        os: "linux",
        arch: Some("aarch64"),
        path: "linux-arm64/libgline_binding.so.gz",
    },
    ArtifactRow {
        os: "linux",
        arch: Some("x86_64"),
        path: "linux-amd64/libgline_binding.so.gz",
    },
];

/// Relative path of the bundled library artifact for `platform`.
pub fn resolve_artifact(platform: &Platform) -> Result<&'static str, GlineError> {
    ARTIFACTS
        .iter()
        .find(|row| {
            row.os == platform.os && row.arch.is_none_or(|arch| arch == platform.arch)
        })
        .map(|row| row.path)
        .ok_or_else(|| GlineError::PlatformUnsupported {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        })
}
