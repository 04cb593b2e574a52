// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Base image resolution and manifest extraction.
//!
//! 1. **Resolve**: `image load` a local archive or `image pull` a reference,
//!    and parse the resulting image reference from the runtime's output
//! 2. **Extract**: run a throwaway container from that image that copies the
//!    embedded Gramine manifest onto a bind-mounted working directory
//! 3. **Read**: load the copied file from the host side

use crate::constants::{
    CONTAINER_SHELL, EXTRACTED_MANIFEST_FILE, HOST_MOUNT_POINT, IMAGE_MANIFEST_PATH,
};
use crate::container::{ContainerRuntime, Mount, RunSpec};
use crate::errors::AppError;
use crate::models::{BaseImage, BaseImageSource, EnclaveTuning};
use crate::parsers::{LoadedImageParser, OutputParser, PulledImageParser};
use crate::process::{CommandRunner, run_checked};
use crate::session::WorkingSession;

/// Loads or pulls the base image and returns its reference.
///
/// # Errors
///
/// Returns [`AppError::RunError`] if the runtime command fails and
/// [`AppError::ParseError`] if no image reference can be read from its
/// output.
#[tracing::instrument(skip(runner, runtime))]
pub async fn resolve_image<R: CommandRunner>(
    runner: &R,
    runtime: &ContainerRuntime,
    source: &BaseImageSource,
) -> Result<String, AppError> {
    let reference = match source {
        BaseImageSource::Archive(path) => {
            let stdout = run_checked(runner, &runtime.image_load(path)).await?;
            LoadedImageParser.parse(&stdout)?
        }
        BaseImageSource::Reference(reference) => {
            let stdout = run_checked(runner, &runtime.image_pull(reference)).await?;
            PulledImageParser.parse(&stdout)?
        }
    };

    tracing::info!("[packager] resolved base image: {}", reference);

    Ok(reference)
}

/// Run parameters for copying the embedded manifest out of `image`.
pub fn extraction_spec(
    session: &WorkingSession,
    image: &str,
    tuning: &EnclaveTuning,
) -> RunSpec {
    RunSpec {
        image: image.to_string(),
        name: None,
        entrypoint: Some(CONTAINER_SHELL.to_string()),
        hostname: None,
        mounts: vec![Mount::read_write(session.root(), HOST_MOUNT_POINT)],
        env: tuning.env(),
        args: vec![
            "-exc".to_string(),
            format!("cp -f {IMAGE_MANIFEST_PATH} {HOST_MOUNT_POINT}/{EXTRACTED_MANIFEST_FILE}"),
        ],
    }
}

/// Resolves the base image and extracts its embedded manifest.
///
/// The container runtime is probed first; nothing else runs if it is
/// unavailable.
///
/// # Errors
///
/// Returns [`AppError::PreconditionError`] if the runtime is unreachable,
/// [`AppError::ExtractionError`] if the manifest did not appear in the
/// working directory, plus any error from [`resolve_image`].
#[tracing::instrument(skip(runner, runtime, session, tuning))]
pub async fn extract_manifest<R: CommandRunner>(
    runner: &R,
    runtime: &ContainerRuntime,
    session: &WorkingSession,
    source: &BaseImageSource,
    tuning: &EnclaveTuning,
) -> Result<BaseImage, AppError> {
    runtime.ensure_available(runner).await?;

    let reference = resolve_image(runner, runtime, source).await?;

    // A leftover file from an earlier run would hide a failed copy.
    let manifest_path = session.extracted_manifest_path();
    match tokio::fs::remove_file(&manifest_path).await {
        Ok(()) => tracing::debug!("[packager] removed stale {}", manifest_path.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let spec = extraction_spec(session, &reference, tuning);
    runtime.execute(runner, &spec).await?;

    let manifest = match tokio::fs::read(&manifest_path).await {
        Ok(manifest) => manifest,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::ExtractionError(format!(
                "An error occurred while extract the manifest: {} was not created",
                manifest_path.display()
            )));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        "[packager] extracted manifest ({} bytes) from {}",
        manifest.len(),
        reference
    );

    Ok(BaseImage {
        reference,
        manifest,
    })
}
