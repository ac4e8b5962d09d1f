mod adapter;
mod cli;
mod config;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rapidup_remote::{ApiClient, OssClient};
use rapidup_upload::{CredentialBundle, InterruptCoordinator, ResultSummary, Target, Uploader};

use adapter::{RemoteMetadata, RemoteStore};
use cli::Cli;
use config::UploaderConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(summary) if summary.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,rapidup=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ResultSummary> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_path()?,
    };
    let Some(mut cfg) = UploaderConfig::load_or_init(&config_path)? else {
        anyhow::bail!(
            "no config found, wrote a default to {}; fill in your cookies and run again",
            config_path.display()
        );
    };
    cli.apply(&mut cfg);
    if cfg.cookies.trim().is_empty() {
        anyhow::bail!("no cookies configured in {}", config_path.display());
    }

    let retry = cfg.retry_policy();
    let api = ApiClient::new(&cfg.cookies, retry).context("building API client")?;
    let oss = OssClient::new(cfg.endpoint(), retry).context("building object-store client")?;

    let user = api.user_info().await.context("reading account info")?;
    info!(user_id = user.user_id, "logged in");
    let credentials = CredentialBundle {
        user_id: user.user_id.to_string(),
        user_key: user.user_key,
    };

    let targets = collect_targets(&cli.paths, cfg.cid);
    if targets.is_empty() {
        anyhow::bail!("nothing to upload");
    }

    let interrupt = InterruptCoordinator::new();
    signals::spawn_listeners(interrupt.clone());
    info!(targets = targets.len(), "press q then Enter to pause");

    let uploader = Uploader::new(
        RemoteMetadata::new(api),
        RemoteStore::new(oss),
        credentials,
        cfg.engine_config(),
        interrupt,
    )?;
    let summary = uploader.upload_all(&targets).await;
    report(&summary);
    Ok(summary)
}

/// Stats each path; anything that is not a regular file is skipped.
fn collect_targets(paths: &[PathBuf], cid: u64) -> Vec<Target> {
    paths
        .iter()
        .filter_map(|path| match Target::from_path(path, cid) {
            Ok(target) => Some(target),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping");
                None
            }
        })
        .collect()
}

fn report(summary: &ResultSummary) {
    for path in &summary.saved {
        info!(path = %path.display(), "paused, resume by running again");
    }
    for (path, reason) in &summary.failed {
        error!(path = %path.display(), reason = %reason, "failed");
    }
    info!(
        succeeded = summary.success.len(),
        failed = summary.failed.len(),
        paused = summary.saved.len(),
        "done"
    );
}
