// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use solution_packager::configuration::{LogFormat, PackagerCommand, PackagerOptions};
use solution_packager::container::ContainerRuntime;
use solution_packager::errors::FailureReport;
use solution_packager::keygen::generate_signing_key;
use solution_packager::models::PrepareRequest;
use solution_packager::pipeline::Packager;
use solution_packager::process::SystemRunner;
use solution_packager::session::WorkingSession;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    // logs go to stderr, stdout carries the JSON result
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            // this needs to be set to remove duplicated information in the log.
            .with_current_span(false)
            // CI log collectors add their own timestamps.
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let options = PackagerOptions::parse();

    init_tracing(options.log_format);

    tracing::info!("[packager] {:?}", &options);

    let runner = SystemRunner::with_timeout(options.timeout());

    match &options.command {
        PackagerCommand::Prepare(prepare) => {
            let session = match WorkingSession::create(prepare.working_dir.clone()).await {
                Ok(session) => session,
                Err(err) => {
                    print_json(&FailureReport::from(&err))?;
                    return Ok(ExitCode::FAILURE);
                }
            };

            let packager = Packager::new(runner, ContainerRuntime::new(&options.docker_bin));
            match packager.prepare(&PrepareRequest::from(prepare), &session).await {
                Ok(prepared) => {
                    print_json(&prepared)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    print_json(&err.report())?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        PackagerCommand::GenerateKey(generate) => {
            match generate_signing_key(&runner, &generate.output).await {
                Ok(()) => {
                    print_json(&serde_json::json!({ "key_path": generate.output }))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    print_json(&FailureReport::from(&err))?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
