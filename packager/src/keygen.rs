// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::Path;

use crate::constants::{OPENSSL_BINARY, OPENSSL_REMEDIATION, SIGNING_KEY_BITS};
use crate::errors::AppError;
use crate::preflight::assert_command;
use crate::process::{CommandRunner, Invocation, run_checked};

pub fn genrsa_invocation(output: &Path) -> Invocation {
    Invocation::new(OPENSSL_BINARY)
        .args(["genrsa", "-3", "-out"])
        .arg(output.display().to_string())
        .arg(SIGNING_KEY_BITS)
}

/// Generates a solution signing key at `output` with `openssl genrsa`.
///
/// # Errors
///
/// Returns [`AppError::PreconditionError`] if `openssl` is unavailable,
/// [`AppError::ValidationError`] if `output` already exists and
/// [`AppError::RunError`] if key generation fails.
#[tracing::instrument(skip(runner))]
pub async fn generate_signing_key<R: CommandRunner>(
    runner: &R,
    output: &Path,
) -> Result<(), AppError> {
    assert_command(
        runner,
        &Invocation::new(OPENSSL_BINARY).arg("version"),
        OPENSSL_REMEDIATION,
    )
    .await?;

    if tokio::fs::try_exists(output).await? {
        return Err(AppError::ValidationError(format!(
            "refusing to overwrite existing key {}",
            output.display()
        )));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!("[packager] generating solution key at {}", output.display());

    run_checked(runner, &genrsa_invocation(output)).await?;

    Ok(())
}
