mod artifact;
mod cli;
mod config;
mod error;
mod mirror;
mod net;
mod proxy;
mod retry;
mod types;
mod updater;
mod version;


use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use config::{
    get_setting, load_config, load_stored_config, save_config, set_setting, unset_setting,
    SETTING_KEYS,
};
use error::UpdateError;
use net::NetContext;
use types::{ArtupConfig, ArtupSettings, GROUP};
use updater::{keep_installed, UpdateOutcome, UpdateReport, Updater};
use version::{sort_by_version, version_weight};

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let command = cli.command.take().unwrap_or(Commands::Update);

    match &command {
        Commands::Version => {
            println!("artup v{}", env!("CARGO_PKG_VERSION"));
        }

        Commands::Config { action } => {
            handle_config(action)?;
        }

        Commands::Update | Commands::Check | Commands::Versions | Commands::Pom { .. } => {
            let config = load_config()?;
            let settings = apply_cli_overrides(config.settings, &cli);
            if let Err(e) = run_network_command(&command, &settings).await {
                report_fatal(&e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn apply_cli_overrides(mut settings: ArtupSettings, cli: &Cli) -> ArtupSettings {
    if let Some(kind) = cli.kind {
        settings.kind = kind;
    }
    if let Some(policy) = cli.policy {
        settings.policy = policy;
    }
    if let Some(proxy) = &cli.proxy {
        settings.proxy = proxy.clone();
    }
    if let Some(dir) = &cli.dir {
        settings.content_dir = dir.clone();
    }
    settings
}

async fn run_network_command(
    command: &Commands,
    settings: &ArtupSettings,
) -> Result<(), UpdateError> {
    if matches!(command, Commands::Update | Commands::Check) {
        let content_dir = std::path::Path::new(&settings.content_dir);
        if let Some(report) = keep_installed(content_dir, settings.kind, settings.policy)? {
            print_report(&report);
            return Ok(());
        }
    }

    let ctx = NetContext::establish(settings, Some(settings.proxy.as_str())).await?;
    if let Some(proxy) = ctx.proxy() {
        tracing::debug!("All requests go through {}", proxy);
    }
    let updater = Updater::new(&ctx, settings, settings.kind, settings.policy);

    match command {
        Commands::Check => {
            let report = updater.check().await?;
            print_report(&report);
        }
        Commands::Versions => {
            let versions = updater.remote_versions().await?;
            println!("--- {} versions ---", settings.kind.project_name());
            for version in sort_by_version(&versions) {
                println!("  {:<16} (weight {})", version, version_weight(&version));
            }
        }
        Commands::Pom { release } => {
            let pom = updater
                .fetcher()
                .fetch_pom_text(GROUP, &settings.kind.project_name(), release)
                .await?;
            println!("{}", pom);
        }
        _ => {
            tracing::debug!("Content directory: {}", updater.content_dir().display());
            let report = updater.run().await?;
            print_report(&report);
        }
    }

    Ok(())
}

fn print_report(report: &UpdateReport) {
    tracing::debug!(
        "Finished in state {} (local {}, newest {})",
        report.final_state(),
        report.current,
        report.newest.as_deref().unwrap_or("not checked")
    );
    let project = report.kind.project_name();
    match &report.outcome {
        UpdateOutcome::Kept { version } => {
            println!(
                "{} {} installed, policy {}: staying on current version.",
                project, version, report.policy
            );
        }
        UpdateOutcome::UpToDate { version } => {
            println!("{} is up to date ({}).", project, version);
        }
        UpdateOutcome::Available { from, to } => {
            println!(
                "{} update available: {} -> {} (policy {})",
                project, from, to, report.policy
            );
        }
        UpdateOutcome::Updated { from, to, path } => {
            println!("Updated {} from {} to {}", project, from, to);
            println!("  Path: {}", path.display());
        }
    }
}

/// Print the error with every suppressed failure it carries.
fn report_fatal(error: &UpdateError) {
    let hint = match error {
        UpdateError::InvalidProxy { .. } => {
            "Check the --proxy setting, or pass DEFAULT for a direct connection."
        }
        UpdateError::NoVersionFound { .. } => {
            "Try a different --policy, or check the repository listing."
        }
        UpdateError::ArtifactNotFound { .. } => {
            "The selected version is not available on any mirror."
        }
        _ => "Failed to update, please seek for help.",
    };
    tracing::error!("{}", error);
    eprintln!("{}", hint);
}

fn handle_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config()?;
            if let Some(key) = key {
                println!("{}", get_setting(&config.settings, key)?);
            } else {
                println!("--- artup Settings ---");
                for key in SETTING_KEYS {
                    println!("  {}: {}", key, get_setting(&config.settings, key)?);
                }
            }
        }
        ConfigAction::Set { args } => {
            let (key, value) = if args.len() == 1 {
                let (k, v) = args[0]
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Invalid format. Use 'key=value' or 'key value'."))?;
                (k.to_string(), v.to_string())
            } else {
                (args[0].clone(), args[1..].join(" "))
            };
            let mut config = load_stored_config()?;
            set_setting(&mut config.settings, &key, &value)?;
            save_config(&config)?;
            tracing::info!("Setting '{}' updated to '{}'", key, value);
        }
        ConfigAction::Unset { key } => {
            let mut config = load_stored_config()?;
            unset_setting(&mut config.settings, key)?;
            save_config(&config)?;
            tracing::info!("Setting '{}' unset", key);
        }
        ConfigAction::Show { format } => {
            let config: ArtupConfig = load_config()?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&config)?),
                "yaml" => print!("{}", serde_yaml::to_string(&config)?),
                other => return Err(anyhow!("Unknown format '{}'. Use json or yaml.", other)),
            }
        }
    }
    Ok(())
}
