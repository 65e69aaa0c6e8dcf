use std::process::ExitCode;

use clap::Parser;

use azptu_core::{CoreError, ValidationFailure, ValidationResult};

mod args;
mod cmd;
mod config;
mod context;
mod logging;
mod output;
mod remote;

use remote::RemoteError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = args::Cli::parse();
    logging::init(cli.verbose);
    let json = cli.json;

    match cmd::dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e, json),
    }
}

/// Exit 2 when the request was refused locally, 1 otherwise.
fn report(err: &anyhow::Error, json: bool) -> ExitCode {
    if let Some(failure) = err.chain().find_map(|e| e.downcast_ref::<ValidationFailure>()) {
        if json {
            let rejected = ValidationResult::from(failure.clone());
            if let Ok(s) = serde_json::to_string_pretty(&rejected) {
                println!("{s}");
            }
        }
        eprintln!("error: local validation failed, no request was sent: {failure}");
        return ExitCode::from(2);
    }

    let user_input = err
        .chain()
        .find_map(|e| e.downcast_ref::<CoreError>())
        .is_some_and(CoreError::is_user_input);
    if user_input {
        eprintln!("error: {err:#}");
        return ExitCode::from(2);
    }

    if err.chain().any(|e| e.is::<RemoteError>()) {
        eprintln!("error: remote call failed: {err:#}");
    } else {
        eprintln!("error: {err:#}");
    }
    ExitCode::FAILURE
}
