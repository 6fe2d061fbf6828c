//! Tester-side subcommands, driven through [`panel_client`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use panel_client::{ClientConfig, PanelClient, SubmitResponse};
use panel_store::{Role, Store};

/// Default config filename, matching what the tool ships with.
const DEFAULT_CONFIG: &str = "test_panel_config.json";

/// Arguments shared by every client-side command.
#[derive(Parser, Debug)]
pub struct ConfigOnlyArgs {
    /// Config file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

fn client(config: &PathBuf) -> Result<PanelClient> {
    // Fall back to config discovery when the default path is absent.
    let path = if config.as_os_str() == DEFAULT_CONFIG && !config.exists() {
        ClientConfig::discover().unwrap_or_else(|| config.clone())
    } else {
        config.clone()
    };
    PanelClient::from_config_file(&path)
        .with_context(|| format!("load config from {}", path.display()))
}

/// Arguments for `test-panel submit`.
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// The session_results.json to submit.
    pub file: PathBuf,

    /// Config file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Fail instead of queueing when the panel is unreachable.
    #[arg(long)]
    pub no_queue: bool,
}

pub async fn submit(args: SubmitArgs) -> Result<()> {
    let client = client(&args.config)?;
    let response = if args.no_queue {
        let raw = std::fs::read_to_string(&args.file)
            .with_context(|| format!("read {}", args.file.display()))?;
        let data = serde_json::from_str(&raw)
            .with_context(|| format!("parse {}", args.file.display()))?;
        client.submit_data(data, false).await?
    } else {
        client.submit_file(&args.file).await?
    };

    match response {
        SubmitResponse::Accepted(outcomes) => {
            for outcome in &outcomes {
                println!(
                    "{}: {} (report {}, revision {}, {} tests, {} logs)",
                    outcome.client_version,
                    outcome.action,
                    outcome.report_id,
                    outcome.revision,
                    outcome.tests_recorded,
                    outcome.logs_attached,
                );
                if !outcome.regressions.is_empty() {
                    println!("  regressions: {}", outcome.regressions.join(", "));
                }
                if let Some(url) = &outcome.view_url {
                    println!("  view: {url}");
                }
            }
        }
        SubmitResponse::Queued { submission_id } => {
            println!("panel unreachable - queued as {submission_id}");
        }
    }
    Ok(())
}

/// Arguments for `test-panel pending`.
#[derive(Parser, Debug)]
pub struct PendingArgs {
    /// Config file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Retry the queue instead of just listing it.
    #[arg(long)]
    pub retry: bool,
}

pub async fn pending(args: PendingArgs) -> Result<()> {
    let client = client(&args.config)?;
    let queued = client.pending_submissions();
    if queued.is_empty() {
        println!("no pending submissions");
        return Ok(());
    }
    for item in &queued {
        println!(
            "{}  queued {}  attempts {}{}",
            item.id,
            item.created_at,
            item.attempts,
            item.last_error
                .as_deref()
                .map(|e| format!("  last error: {e}"))
                .unwrap_or_default(),
        );
    }
    if args.retry {
        let submitted = client.process_pending().await?;
        println!("submitted {submitted} of {}", queued.len());
    }
    Ok(())
}

/// Arguments for `test-panel check-retests`.
#[derive(Parser, Debug)]
pub struct CheckRetestsArgs {
    /// Config file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Only items for this version.
    #[arg(long)]
    pub version: Option<String>,
}

pub async fn check_retests(args: CheckRetestsArgs) -> Result<()> {
    let client = client(&args.config)?;
    let items = client.retest_queue(args.version.as_deref()).await?;
    if items.is_empty() {
        println!("retest queue is empty");
        return Ok(());
    }
    for item in &items {
        println!(
            "[{}] {} on {} ({}): {}",
            item.kind.as_str(),
            item.test_name,
            item.client_version,
            item.test_key,
            item.reason,
        );
        if let Some(notes) = &item.notes {
            println!("    {notes}");
        }
    }
    Ok(())
}

/// Arguments for `test-panel daemon`.
#[derive(Parser, Debug)]
pub struct DaemonArgs {
    /// Config file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Poll interval in seconds, overriding the config.
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Poll the flag endpoint on the configured interval, acknowledging and
/// printing whatever shows up, and replaying queued submissions whenever
/// the panel is reachable.
pub async fn daemon(args: DaemonArgs) -> Result<()> {
    let client = client(&args.config)?;
    if !client.config().auto_check_retests {
        bail!("auto_check_retests is disabled in the config");
    }
    let interval = Duration::from_secs(
        args.interval
            .unwrap_or(client.config().check_interval)
            .max(1),
    );
    log::info!("polling for retest flags every {}s", interval.as_secs());

    loop {
        match client.check_flags().await {
            Ok(check) if check.count > 0 => {
                for flag in &check.flags {
                    println!(
                        "[{}] {} on {}: {}",
                        flag.kind.as_str(),
                        flag.test_name,
                        flag.client_version,
                        flag.reason,
                    );
                    if let Err(e) = client.acknowledge_flag(flag.kind, flag.id).await {
                        log::warn!("failed to acknowledge flag {}: {e}", flag.id);
                    }
                }
            }
            Ok(_) => log::debug!("no new flags"),
            Err(e) => log::debug!("flag check failed (offline?): {e}"),
        }

        if !client.pending_submissions().is_empty() {
            match client.process_pending().await {
                Ok(0) => {}
                Ok(n) => log::info!("submitted {n} queued report(s)"),
                Err(e) => log::warn!("pending replay failed: {e}"),
            }
        }

        tokio::time::sleep(interval).await;
    }
}

pub async fn test_connection(args: ConfigOnlyArgs) -> Result<()> {
    let client = client(&args.config)?;
    let info = client.test_connection().await?;
    println!("connected as {} ({})", info.username, info.role);
    println!("{} mirrored commit(s)", info.revisions.len());
    Ok(())
}

/// Arguments for `test-panel create-config`.
#[derive(Parser, Debug)]
pub struct CreateConfigArgs {
    /// Where to write the template.
    #[arg(default_value = DEFAULT_CONFIG)]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn create_config(args: CreateConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        );
    }
    ClientConfig::template().save(&args.path)?;
    println!("wrote config template to {}", args.path.display());
    println!("fill in api_url and api_key before first use");
    Ok(())
}

/// Arguments for `test-panel invite`.
#[derive(Parser, Debug)]
pub struct InviteArgs {
    /// SQLite database path.
    #[arg(long, default_value = "test_panel.db")]
    pub db: PathBuf,

    /// Role the invite grants.
    #[arg(long, default_value = "tester")]
    pub role: String,
}

/// Mint an invite straight against the database. This is how the first
/// admin account gets bootstrapped before the HTTP surface has any users.
pub fn invite(args: InviteArgs) -> Result<()> {
    let store = Store::open(&args.db)
        .with_context(|| format!("open database at {}", args.db.display()))?;
    let role = Role::parse(&args.role);
    let code = store.create_invite(role, None).context("create invite")?;
    println!("invite code ({}): {code}", role.as_str());
    println!("claim it with POST /api/register");
    Ok(())
}
