use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::errors::{Result, SegError};

/// File names tried, in order, when no model path is given.
/// Each entry is relative to the executable's directory.
pub const MODEL_CANDIDATES: [&str; 4] = [
    "../unet_best_(1).onnx",
    "../unet_best.onnx",
    "unet_best_(1).onnx",
    "unet_best.onnx",
];

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "SEGMENT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(short, long, env = "PY_MODEL_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Skips model discovery when set.
    #[arg(short, long, env = "SEGMENT_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    #[arg(short, long, env = "SEGMENT_DEVICE_ID", default_value_t = 0)]
    pub device_id: i32,

    /// tracing-subscriber filter directives
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Config {
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Locates the model file: the explicit path if given, otherwise the first
    /// existing candidate next to the executable.
    pub fn resolve_model_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.model_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(SegError::Configuration {
                message: format!("model file not found: {}", path.display()),
            });
        }

        let exe = std::env::current_exe().map_err(|e| SegError::Configuration {
            message: format!("cannot locate executable: {e}"),
        })?;
        let base = exe.parent().unwrap_or(Path::new("."));
        discover_model(base)
    }
}

/// Returns the first candidate under `base` that exists on disk.
pub fn discover_model(base: &Path) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = MODEL_CANDIDATES.iter().map(|c| base.join(c)).collect();

    candidates
        .iter()
        .find(|path| path.exists())
        .cloned()
        .ok_or_else(|| SegError::Configuration {
            message: format!(
                "model file not found. Looked for: {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}
