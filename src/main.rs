//! wordscan CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wordscan::config::cli::Cli;
use wordscan::config::{toml, validator, Config};
use wordscan::output::{json, text};
use wordscan::{CancellationToken, Coordinator, RunOutcome};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            let _ = e.print();
            return code;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    cli.validate()?;

    let config = toml::load_config(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config);
    tracing::debug!("{}", config);

    let shutdown = CancellationToken::new();
    install_interrupt_handler(shutdown.clone())?;

    let config = Arc::new(config);
    let mut coordinator = Coordinator::new(Arc::clone(&config), shutdown).on_teardown(text::print_teardown_event);

    match coordinator.run()? {
        RunOutcome::Completed(report) => {
            text::print_results(&report, &config);

            if report.teardown.failures() > 0 {
                tracing::warn!(
                    failed = report.teardown.failures(),
                    "some processes did not exit cleanly"
                );
            }

            if let Some(path) = &config.output.json_output {
                json::write_json_output(path, &json::build_completed_report(&report, &config), true)?;
                println!("JSON report written to {}", path.display());
            }
        }
        RunOutcome::Cancelled(teardown) => {
            text::print_cancelled();

            if let Some(path) = &config.output.json_output {
                json::write_json_output(path, &json::build_cancelled_report(&teardown, &config), true)?;
            }
        }
    }

    Ok(())
}

/// Log to stderr; RUST_LOG directives override the default level
fn init_logging(config: &Config) {
    let level = if config.runtime.debug {
        tracing::Level::DEBUG
    } else if config.output.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Fire `shutdown` on Ctrl-C
///
/// The signal is awaited on a current-thread runtime owned by a dedicated
/// thread, so the coordinator itself stays fully synchronous.
fn install_interrupt_handler(shutdown: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?;

    std::thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("Received interrupt, terminating processes...");
                        shutdown.cancel();
                    }
                    Err(e) => tracing::warn!("Failed to listen for interrupt: {}", e),
                }
            })
        })
        .context("Failed to spawn signal thread")?;

    Ok(())
}
