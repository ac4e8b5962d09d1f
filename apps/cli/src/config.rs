//! Uploader configuration file.
//!
//! Lives in `rapidup.json` next to the executable unless `--config` points
//! elsewhere. A missing file is created with defaults so the user can fill
//! in their cookies.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rapidup_protocol::constants::{MAX_PARTS, OSS_ENDPOINT, OSS_INTERNAL_ENDPOINT};
use rapidup_remote::RetryPolicy;
use rapidup_transfer::PartPolicy;
use rapidup_upload::{EngineConfig, UploadMode};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "rapidup.json";

fn default_http_retry() -> u32 {
    3
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

/// Settings read from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploaderConfig {
    /// Cookie header value of a logged-in session.
    #[serde(default)]
    pub cookies: String,

    /// Default destination container id.
    #[serde(default)]
    pub cid: u64,

    #[serde(default = "default_http_retry")]
    pub http_retry: u32,

    /// Explicit part count; 0 picks one automatically.
    #[serde(default)]
    pub parts_num: u32,

    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    #[serde(default)]
    pub mode: UploadMode,

    /// Overrides the object-store endpoint when non-empty.
    #[serde(default)]
    pub oss_endpoint: String,

    /// Use the intranet object-store endpoint.
    #[serde(default)]
    pub internal_endpoint: bool,

    #[serde(default)]
    pub remove_after_upload: bool,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            cookies: String::new(),
            cid: 0,
            http_retry: default_http_retry(),
            parts_num: 0,
            checkpoint_dir: default_checkpoint_dir(),
            mode: UploadMode::default(),
            oss_endpoint: String::new(),
            internal_endpoint: false,
            remove_after_upload: false,
        }
    }
}

impl UploaderConfig {
    /// Reads `path`, or writes a default file there and returns `None`.
    pub fn load_or_init(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            let json = serde_json::to_string_pretty(&Self::default())?;
            std::fs::write(path, json)
                .with_context(|| format!("writing default config to {}", path.display()))?;
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    /// Object-store endpoint to talk to.
    pub fn endpoint(&self) -> &str {
        if !self.oss_endpoint.is_empty() {
            &self.oss_endpoint
        } else if self.internal_endpoint {
            OSS_INTERNAL_ENDPOINT
        } else {
            OSS_ENDPOINT
        }
    }

    /// Retry policy shared by both HTTP clients.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.http_retry)
    }

    /// The engine's view of these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            part_policy: PartPolicy::from_count(self.parts_num),
            part_cap: MAX_PARTS,
            checkpoint_dir: self.checkpoint_dir.clone(),
            mode: self.mode,
            remove_after_upload: self.remove_after_upload,
        }
    }
}

/// `rapidup.json` beside the running executable.
pub fn default_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("locating executable")?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(CONFIG_FILE_NAME))
}
