// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use crate::errors::AppError;
use crate::process::{CommandRunner, Invocation};

/// Verifies that an external tool answers its probe invocation.
///
/// # Errors
///
/// Returns [`AppError::PreconditionError`] carrying `remediation` if the
/// probe cannot be spawned or exits unsuccessfully.
#[tracing::instrument(skip(runner))]
pub async fn assert_command<R: CommandRunner>(
    runner: &R,
    probe: &Invocation,
    remediation: &str,
) -> Result<(), AppError> {
    match runner.run(probe).await {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => {
            tracing::warn!(
                "[packager] probe `{}` exited with {:?}: {}",
                probe,
                output.exit_code,
                output.stderr.trim()
            );
            Err(AppError::PreconditionError(remediation.to_string()))
        }
        Err(err) => {
            tracing::warn!("[packager] probe `{}` failed: {}", probe, err);
            Err(AppError::PreconditionError(remediation.to_string()))
        }
    }
}
