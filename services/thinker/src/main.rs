mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use svckit::config::{load_config, ThinkerConfig};
use svckit::database::DatabaseFactory;

use crate::cli::Cli;
use crate::commands::Command;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let name = cli.command.name();
    let verbose_flag = cli.verbose;

    let prepared = prepare(cli);
    init_tracing(
        prepared
            .as_ref()
            .map(|(config, _)| config.verbose)
            .unwrap_or(verbose_flag),
    );

    let result = match prepared {
        Ok((config, command)) => execute(command.as_ref(), &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to execute command {} - {:#}", name, e);
            ExitCode::FAILURE
        }
    }
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "thinker=debug,svckit=debug"
    } else {
        "thinker=info,svckit=info"
    }
}

// Logs go to stderr so command output on stdout stays parseable
fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolves the layered configuration and the command to run
fn prepare(cli: Cli) -> Result<(ThinkerConfig, Box<dyn Command>)> {
    let invocation = cli.into_invocation()?;
    let config = load_config(&invocation.overrides)?.with_target(invocation.target);
    Ok((config, invocation.command))
}

async fn execute(command: &dyn Command, config: &ThinkerConfig) -> Result<()> {
    debug!(
        command = command.name(),
        flags = ?command.flags(),
        host = %config.host,
        port = config.port,
        "Running command"
    );

    let session = DatabaseFactory::open_session(config)
        .await
        .with_context(|| format!("could not connect to {}:{}", config.host, config.port))?;
    debug!(nodes = ?session.topology().nodes, "Cluster topology");

    let mut stdout = std::io::stdout();
    let result = command.execute(config, session.connection(), &mut stdout).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close connection: {}", e);
    }
    Ok(result?)
}
