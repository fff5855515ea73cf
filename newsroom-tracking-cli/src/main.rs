//! newsroom-tracking - inspect and replay newsroom tracking state
//!
//! This tool provides commands for:
//! - Showing the effective tracking configuration and the deferred identity
//! - Forgetting the deferred identity
//! - Replaying a script of tracking calls through the façade
//!
//! Uses XDG Base Directory specification for file locations:
//! - Store: $XDG_DATA_HOME/newsroom-tracking/state.db
//! - Config: $XDG_CONFIG_HOME/newsroom-tracking/config.toml

mod printer;
mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsroom_tracking_core::{Config, DeferredIdentityStore, TrackingPolicy, Tracker};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uuid::Uuid;

use crate::printer::PrintClient;
use crate::script::Step;

#[derive(Parser)]
#[command(name = "newsroom-tracking")]
#[command(about = "Inspect and replay newsroom tracking state")]
#[command(version)]
struct Args {
    /// Write logs to the XDG state directory
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracking configuration and the deferred identity
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove the deferred identity
    Forget,

    /// Run a JSON-lines script of tracking calls through the façade
    Replay {
        /// Script file, one JSON step per line
        script: PathBuf,

        /// Start with consent already given
        #[arg(long)]
        consent: bool,

        /// Newsroom id; enables tracking regardless of config
        #[arg(long)]
        newsroom: Option<Uuid>,

        /// Tracking policy override (e.g. CONSENT_TO_IDENTIFY)
        #[arg(long)]
        policy: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(
            newsroom_tracking_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Status { json } => cmd_status(&config, json),
        Command::Forget => cmd_forget(&config),
        Command::Replay {
            script,
            consent,
            newsroom,
            policy,
        } => cmd_replay(config, &script, consent, newsroom, policy.as_deref()),
    }
}

fn cmd_status(config: &Config, json: bool) -> Result<()> {
    let store = config.open_store().context("failed to open store")?;
    let deferred = store.get().context("failed to read deferred identity")?;
    let written = store
        .last_written()
        .context("failed to read deferred identity timestamp")?;
    let tracking = &config.tracking;

    if json {
        let status = serde_json::json!({
            "enabled": tracking.enabled,
            "newsroom": tracking.newsroom,
            "story": tracking.story,
            "policy": tracking.policy,
            "persist": config.storage.persist,
            "store": config.store_path(),
            "deferredIdentity": deferred,
            "deferredAt": written.map(|at| at.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Newsroom Tracking Status");
    println!("========================");
    println!();
    println!("Enabled:         {}", tracking.enabled);
    println!(
        "Newsroom:        {}",
        tracking
            .newsroom
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<not set>".to_string())
    );
    if let Some(story) = tracking.story {
        println!("Story:           {}", story);
    }
    println!("Policy:          {}", tracking.policy);
    println!(
        "Store:           {}",
        if config.storage.persist {
            config.store_path().display().to_string()
        } else {
            "<memory>".to_string()
        }
    );
    println!();

    match deferred {
        Some(identity) => {
            println!("Deferred identity: {}", identity.user_id);
            if let Some(at) = written {
                println!("  stored: {}", at.to_rfc3339());
            }
            if !identity.traits.is_empty() {
                println!(
                    "  traits: {}",
                    serde_json::to_string(&identity.traits).unwrap_or_default()
                );
            }
        }
        None => println!("Deferred identity: <none>"),
    }

    Ok(())
}

fn cmd_forget(config: &Config) -> Result<()> {
    let store = config.open_store().context("failed to open store")?;
    // An unreadable slot is still removed
    let existing = store.get().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read deferred identity before removing it");
        None
    });
    store.remove().context("failed to remove deferred identity")?;

    match existing {
        Some(identity) => println!("Forgot deferred identity for {}", identity.user_id),
        None => println!("No deferred identity stored"),
    }
    Ok(())
}

fn cmd_replay(
    mut config: Config,
    path: &Path,
    consent: bool,
    newsroom: Option<Uuid>,
    policy: Option<&str>,
) -> Result<()> {
    let steps = script::load(path)?;

    if let Some(newsroom) = newsroom {
        config.tracking.newsroom = Some(newsroom);
        config.tracking.enabled = true;
    }
    if let Some(policy) = policy {
        config.tracking.policy = policy
            .parse::<TrackingPolicy>()
            .context("invalid --policy")?;
    }
    if !config.tracking.enabled {
        eprintln!("Tracking is disabled; calls will be ignored (pass --newsroom to enable)");
    }

    let context = config
        .tracking
        .context(consent)
        .context("invalid tracking configuration")?;
    let store = config.open_store().context("failed to open store")?;
    let tracker = Tracker::new(context, store);

    tracing::info!(steps = steps.len(), "Replaying tracking script");

    for step in steps {
        match step {
            Step::Identify { user_id, traits } => tracker.identify(&user_id, traits, None),
            Step::Alias {
                user_id,
                previous_id,
            } => tracker.alias(&user_id, &previous_id),
            Step::Page {
                category,
                name,
                properties,
            } => tracker.page(category.as_deref(), name.as_deref(), properties, None),
            Step::Track { event, properties } => tracker.track(&event, properties, None),
            Step::Consent { granted } => tracker.set_consent(granted),
            Step::Ready => tracker.set_client(Some(Rc::new(PrintClient::new()))),
            Step::Tick => {
                tracker.tick();
            }
        }
    }

    // Drain whatever is left once the client is known
    while tracker.tick() {}

    eprintln!("Pending calls:     {}", tracker.pending());
    match tracker.deferred_identity() {
        Some(identity) => eprintln!("Deferred identity: {}", identity.user_id),
        None => eprintln!("Deferred identity: <none>"),
    }

    Ok(())
}
