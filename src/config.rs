use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, anyhow};

use crate::{ffi, model::EntityMode};

pub const DEFAULT_MODEL_ID: &str = "onnx-community/gliner_small-v2.1";

/// How the protocol adapter talks to its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// MCP over newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    Http,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(format!("unknown transport '{other}', expected 'stdio' or 'http'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_id: String,
    pub cache_dir: Option<PathBuf>,
    pub mode: EntityMode,
    pub transport: Transport,
    pub listen_addr: SocketAddr,
    pub library_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            cache_dir: None,
            mode: EntityMode::Span,
            transport: Transport::Stdio,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            library_dir: ffi::default_artifact_root(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_with(|_| None)
    }

    /// Reads the environment with `overrides` (command-line values) taking
    /// precedence, key by key, before anything is parsed.
    pub fn from_env_with(overrides: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Self::from_layers(overrides, |key| env::var(key).ok())
    }

    pub fn from_layers(
        overrides: impl Fn(&str) -> Option<String>,
        fallback: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        Self::from_lookup(|key| overrides(key).or_else(|| fallback(key)))
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let model_id = lookup("GLINE_MODEL_ID").unwrap_or(defaults.model_id);
        let cache_dir = lookup("GLINE_CACHE_DIR").map(PathBuf::from);

        let mode = match lookup("GLINE_MODE") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow!("invalid GLINE_MODE: {e}"))?,
            None => defaults.mode,
        };
        let transport = match lookup("GLINE_TRANSPORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow!("invalid GLINE_TRANSPORT: {e}"))?,
            None => defaults.transport,
        };

        let listen_addr = match lookup("SERVER_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid SERVER_ADDR '{raw}'"))?,
            None => defaults.listen_addr,
        };
        let library_dir = lookup("GLINE_LIB_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.library_dir);
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_secs)
                .with_context(|| format!("invalid REQUEST_TIMEOUT_SECS '{raw}'"))?,
            None => defaults.request_timeout,
        };

        Ok(Self {
            model_id,
            cache_dir,
            mode,
            transport,
            listen_addr,
            library_dir,
            request_timeout,
        })
    }
}
