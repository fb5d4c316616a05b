use anyhow::{bail, Context, Result};
use ndforge_attack::{AttackManager, AttackOutcome};
use ndforge_cli::{Cli, Commands};
use ndforge_core::{Interface, Sender, SenderMap};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!(
            "ndforge={level},ndforge_cli={level},ndforge_core={level},ndforge_packet={level},ndforge_attack={level}"
        )),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

fn list_interfaces() {
    let interfaces = Interface::list_all();
    if interfaces.is_empty() {
        println!("No interfaces found");
        return;
    }
    for interface in interfaces {
        let state = if interface.is_up { "up" } else { "down" };
        match interface.link_local_ipv6() {
            Some(ip) => println!("{} [{}] {}", interface, state, ip),
            None => println!("{} [{}] no link-local address", interface, state),
        }
    }
}

fn report(outcomes: &[AttackOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(()) => info!(
                spoof = %outcome.target,
                frames = outcome.stats.packets_sent,
                bytes = outcome.stats.bytes_sent,
                errors = outcome.stats.errors,
                "Finished"
            ),
            Err(e) => warn!(
                spoof = %outcome.target,
                frames = outcome.stats.packets_sent,
                errors = outcome.stats.errors,
                error = %e,
                "Failed"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose)?;

    if let Commands::Interfaces = cli.command {
        list_interfaces();
        return Ok(());
    }

    let senders = if cli.dry_run {
        info!("Dry run, frames are built but not sent");
        SenderMap::with_opener(|name| Ok(Sender::dry_run(name).0))
    } else {
        SenderMap::new()
    };
    let manager = Arc::new(
        AttackManager::with_senders(Arc::new(senders)).with_failure_policy(cli.failure_policy()),
    );

    let targets = cli.command.spoof_targets();
    info!(workers = targets.len(), "Launching");
    manager
        .launch_all(targets)
        .context("failed to launch workers")?;

    let stopper = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping workers");
            stopper.signal_stop_all();
        }
    });

    let outcomes = manager.run_for(cli.run_duration()).await;
    manager.shutdown().await;
    report(&outcomes);

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        bail!("{} of {} workers failed", failed, outcomes.len());
    }
    Ok(())
}
