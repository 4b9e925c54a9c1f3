//! multiplay - Run multiple editor instances of one project workspace
//!
//! The binary is a thin host over the orchestrator: it parses a command,
//! invokes the matching core operation, prints the observable state, and tears
//! the session down.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use multiplay::cli::{Args, Command};
use multiplay::core::{is_clone, Orchestrator, OrchestratorConfig};

/// Application name constant
const APP_NAME: &str = "multiplay";

/// Application version
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let origin = match args.project {
        Some(project) => project,
        None => std::env::current_dir().context("resolving the current directory")?,
    };

    // A derived clone must never become the origin of further clones.
    if is_clone(&origin) {
        bail!(
            "{:?} is a derived clone; run {} from the origin workspace",
            origin,
            APP_NAME
        );
    }

    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    let mut config = OrchestratorConfig::new(origin);
    if let Some(editor) = args.editor {
        config.launch.editor_binary = editor;
    }

    let orchestrator = Orchestrator::new(config);
    orchestrator.init().context("initializing session")?;

    let result = run(&orchestrator, args.command).await;
    orchestrator.reset()?;
    result
}

async fn run(orchestrator: &Orchestrator, command: Command) -> Result<()> {
    match command {
        Command::Create { count } => {
            let base_name = orchestrator.project_name();
            for _ in 0..count {
                let index = orchestrator.instances()?.len();
                match orchestrator.create(&base_name, index, false) {
                    Some(id) => println!("created instance {id}"),
                    None => println!("instance creation failed, see log output"),
                }
            }
        }
        Command::List => {
            let instances = orchestrator.instances()?;
            if instances.is_empty() {
                println!("no instances at {:?}", orchestrator.clone_root()?);
                return Ok(());
            }
            for instance in instances {
                println!(
                    "{:>3}  {:<28} {:<9} device={}{}",
                    instance.id,
                    instance.name,
                    instance.state.label(),
                    instance.settings.device_id,
                    if instance.is_running() { "  (running)" } else { "" },
                );
                for (key, notification) in &instance.notifications {
                    println!("     [{key}] {}", notification.message);
                }
            }
        }
        Command::Launch { ids } => {
            select_targets(orchestrator, &ids)?;
            if let Some(focused) = orchestrator.validate_multiple_launches()? {
                bail!("instance {focused} has no remote device bound; launch denied");
            }
            orchestrator.launch_selected().await?;
            for instance in orchestrator.instances()? {
                if instance.is_selected {
                    println!("{}: {}", instance.name, instance.state.label());
                }
            }
        }
        Command::Terminate { ids } => {
            select_targets(orchestrator, &ids)?;
            orchestrator.terminate_selected()?;
        }
        Command::Remove { ids } => {
            select_targets(orchestrator, &ids)?;
            orchestrator.remove_selected()?;
        }
        Command::Device { id, device_id } => {
            orchestrator.set_device(id, &device_id)?;
            println!("instance {id} bound to device {device_id}");
        }
        Command::Social { id, social_id } => {
            orchestrator.set_social_id(id, &social_id)?;
        }
        Command::Config {
            enabled,
            play_on_launch,
            container_dir,
        } => {
            if let Some(enabled) = enabled {
                orchestrator.set_enabled(enabled)?;
            }
            if let Some(play_on_launch) = play_on_launch {
                orchestrator.set_play_on_launch(play_on_launch)?;
            }
            if let Some(container_dir) = container_dir {
                orchestrator.set_container_dir(container_dir)?;
            }
            let global = orchestrator.global()?;
            println!("enabled:        {}", global.enabled);
            println!("play on launch: {}", global.play_on_launch);
            println!(
                "container:      {}",
                global
                    .container_dir
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| "(default)".to_string())
            );
        }
    }
    Ok(())
}

/// Translate explicit ids into selection flags; no ids selects everything.
fn select_targets(orchestrator: &Orchestrator, ids: &[u32]) -> Result<()> {
    if ids.is_empty() {
        return orchestrator.select_all(true);
    }
    orchestrator.select_all(false)?;
    for id in ids {
        orchestrator.set_selected(*id, true)?;
    }
    Ok(())
}

/// Initialize the logging system
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("multiplay=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
