//! The `serve` subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use panel_api::{AppState, build_router};
use panel_github::CommitMirror;
use panel_store::Store;

/// Arguments for `test-panel serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// SQLite database path.
    #[arg(long, default_value = "test_panel.db")]
    pub db: PathBuf,

    /// Use an in-memory database instead of `--db`.
    #[arg(long)]
    pub ephemeral: bool,

    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Base URL used in report view links.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub view_base_url: String,

    /// Emulator repository to mirror ("owner/repo"). No mirror when unset.
    #[arg(long)]
    pub github_repo: Option<String>,

    /// GitHub token for the mirror.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory for the commit mirror cache.
    #[arg(long, default_value = ".")]
    pub cache_dir: PathBuf,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let store = if args.ephemeral {
        Store::open_in_memory().context("open in-memory database")?
    } else {
        Store::open(&args.db)
            .with_context(|| format!("open database at {}", args.db.display()))?
    };
    log::info!(
        "database ready ({})",
        if args.ephemeral {
            "in-memory".to_string()
        } else {
            args.db.display().to_string()
        }
    );

    let mut state = AppState::new(Arc::new(store), &args.view_base_url);
    if let Some(repo) = &args.github_repo {
        let cache_path = args.cache_dir.join("commit_mirror.json");
        let mirror = CommitMirror::new(repo, cache_path)
            .context("configure commit mirror")?
            .with_token(args.github_token.clone());
        log::info!("mirroring commits from {repo}");
        state = state.with_mirror(Arc::new(mirror));
    }

    let app = build_router(state);
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    log::info!("panel listening on {}", args.bind);
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
