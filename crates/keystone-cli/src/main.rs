mod cli;
mod commands;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use keystone_core::{ErrorPayload, KeystoneError};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const LOG_LEVEL_ENV: &str = "KEYSTONE_LOG_LEVEL";

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let operation = cli.command.operation_name();
    match commands::run(cli.db.as_deref(), cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&error_payload(operation, &err));
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr; stdout carries JSON only.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn error_payload(operation: &str, err: &anyhow::Error) -> ErrorPayload {
    let message = format!("{err:#}");
    match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<KeystoneError>())
    {
        Some(queue_err) => ErrorPayload {
            message,
            ..queue_err.to_payload(operation)
        },
        None => ErrorPayload::new("CLI_ERROR", message, operation),
    }
}

fn report_error(payload: &ErrorPayload) {
    let mut stderr = io::stderr().lock();
    if serde_json::to_writer_pretty(&mut stderr, payload).is_err() {
        let _ = writeln!(stderr, "{}: {}", payload.code, payload.message);
        return;
    }
    let _ = writeln!(stderr);
}
