use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rapidup_upload::UploadMode;

use crate::config::UploaderConfig;

#[derive(Debug, Parser)]
#[command(name = "rapidup", version)]
#[command(about = "Resumable uploader for the 115 cloud", long_about = None)]
pub struct Cli {
    /// Files to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Configuration file (default: rapidup.json next to the executable)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Destination container id
    #[arg(long)]
    pub cid: Option<u64>,

    /// What to do when the content is not already stored
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Number of parts per file (0 = automatic)
    #[arg(short, long)]
    pub parts: Option<u32>,

    /// Extra attempts per HTTP request
    #[arg(short, long)]
    pub retry: Option<u32>,

    /// Use the intranet object-store endpoint
    #[arg(long)]
    pub internal: bool,

    /// Delete local files once they are stored
    #[arg(long)]
    pub remove: bool,

    /// Debug logging for rapidup crates
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Dedup only
    Fast,
    /// Dedup, then a single-request upload
    Normal,
    /// Dedup, then a resumable multipart upload
    Multipart,
}

impl From<ModeArg> for UploadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fast => UploadMode::Fast,
            ModeArg::Normal => UploadMode::Normal,
            ModeArg::Multipart => UploadMode::Multipart,
        }
    }
}

impl Cli {
    /// Overrides file settings with the flags that were given.
    pub fn apply(&self, config: &mut UploaderConfig) {
        if let Some(cid) = self.cid {
            config.cid = cid;
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(parts) = self.parts {
            config.parts_num = parts;
        }
        if let Some(retry) = self.retry {
            config.http_retry = retry;
        }
        if self.internal {
            config.internal_endpoint = true;
        }
        if self.remove {
            config.remove_after_upload = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file() {
        let cli = Cli::parse_from([
            "rapidup", "--cid", "77", "-m", "fast", "-p", "8", "--remove", "a.bin", "b.bin",
        ]);
        let mut config = UploaderConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.paths.len(), 2);
        assert_eq!(config.cid, 77);
        assert_eq!(config.mode, UploadMode::Fast);
        assert_eq!(config.parts_num, 8);
        assert_eq!(config.http_retry, 3);
        assert!(config.remove_after_upload);
        assert!(!config.internal_endpoint);
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["rapidup"]).is_err());
    }
}
