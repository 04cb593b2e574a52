// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Manifest signing inside the base image.
//!
//! The base image ships the Gramine toolchain, so signing runs there: a small
//! script is written to the working directory, mounted into a container
//! together with the key, the manifest and two output files, and its output
//! is parsed for the enclave measurement.
//!
//! The output files are created empty on the host before the run. Docker
//! bind-mounts a missing host path as a directory, so a file mount target
//! has to exist up front; other runtimes may not need this.

use std::path::{Path, PathBuf};

use crate::constants::{
    CONTAINER_HOSTNAME, CONTAINER_KEY_PATH, CONTAINER_MANIFEST_PATH, CONTAINER_SCRIPT_PATH,
    CONTAINER_SGX_MANIFEST_PATH, CONTAINER_SHELL, CONTAINER_SIGNATURE_PATH, CONTAINER_TOKEN_PATH,
    GRAMINE_BUILD_LIB_DIR, OUTPUT_SEPARATOR,
};
use crate::container::{ContainerRuntime, Mount, RunSpec};
use crate::errors::AppError;
use crate::models::{BaseImage, EnclaveTuning, SignedManifest};
use crate::parsers::{MeasurementParser, OutputParser};
use crate::process::CommandRunner;
use crate::session::WorkingSession;

/// Script executed inside the base image.
pub fn signing_script() -> String {
    format!(
        r#"#!/bin/sh
set -e
export PYTHONPATH="${{PYTHONPATH}}:$(find {lib} -type d -path '*/site-packages')"
export PKG_CONFIG_PATH="${{PKG_CONFIG_PATH}}:$(find {lib} -type d -path '*/pkgconfig')"
gramine-sgx-sign -k "{key}" -m "{manifest}" -o "{sgx}" -s "{sig}"
echo "{separator}"
gramine-sgx-get-token --sig "{sig}" --output "{token}"
"#,
        lib = GRAMINE_BUILD_LIB_DIR,
        key = CONTAINER_KEY_PATH,
        manifest = CONTAINER_MANIFEST_PATH,
        sgx = CONTAINER_SGX_MANIFEST_PATH,
        sig = CONTAINER_SIGNATURE_PATH,
        separator = OUTPUT_SEPARATOR,
        token = CONTAINER_TOKEN_PATH,
    )
}

/// Bind mounts for the signing container.
pub fn signing_mounts(session: &WorkingSession, key_path: &Path) -> Vec<Mount> {
    vec![
        Mount::read_only(key_path, CONTAINER_KEY_PATH),
        Mount::read_only(session.script_path(), CONTAINER_SCRIPT_PATH),
        Mount::read_only(session.manifest_path(), CONTAINER_MANIFEST_PATH),
        Mount::read_write(session.sgx_manifest_path(), CONTAINER_SGX_MANIFEST_PATH),
        Mount::read_write(session.signature_path(), CONTAINER_SIGNATURE_PATH),
    ]
}

pub fn signing_spec(
    session: &WorkingSession,
    image: &str,
    key_path: &Path,
    tuning: &EnclaveTuning,
) -> RunSpec {
    RunSpec {
        image: image.to_string(),
        name: None,
        entrypoint: Some(CONTAINER_SHELL.to_string()),
        hostname: Some(CONTAINER_HOSTNAME.to_string()),
        mounts: signing_mounts(session, key_path),
        env: tuning.env(),
        args: vec![CONTAINER_SCRIPT_PATH.to_string()],
    }
}

/// Resolves the signing key to an absolute, symlink-free path.
///
/// # Errors
///
/// Returns [`AppError::PreconditionError`] if the key does not exist or is
/// not a regular file.
pub async fn resolve_key_path(key_path: &Path) -> Result<PathBuf, AppError> {
    let resolved = tokio::fs::canonicalize(key_path).await.map_err(|err| {
        AppError::PreconditionError(format!(
            "signing key {} could not be resolved: {}",
            key_path.display(),
            err
        ))
    })?;

    let metadata = tokio::fs::metadata(&resolved).await?;
    if !metadata.is_file() {
        return Err(AppError::PreconditionError(format!(
            "signing key {} is not a file",
            resolved.display()
        )));
    }

    Ok(resolved)
}

/// Signs the manifest of `image` with the key at `key_path`.
///
/// # Errors
///
/// Returns [`AppError::PreconditionError`] if the runtime or the key is
/// missing, [`AppError::RunError`] if the signing container fails,
/// [`AppError::ParseError`] if the measurement is absent from its output and
/// [`AppError::ExtractionError`] if the signed outputs were left empty.
#[tracing::instrument(skip(runner, runtime, session, image, tuning), fields(image = %image.reference))]
pub async fn sign_manifest<R: CommandRunner>(
    runner: &R,
    runtime: &ContainerRuntime,
    session: &WorkingSession,
    image: &BaseImage,
    key_path: &Path,
    tuning: &EnclaveTuning,
) -> Result<SignedManifest, AppError> {
    runtime.ensure_available(runner).await?;

    let key_path = resolve_key_path(key_path).await?;
    tracing::debug!("[packager] signing with key {}", key_path.display());

    tokio::fs::write(session.script_path(), signing_script()).await?;
    tokio::fs::write(session.manifest_path(), &image.manifest).await?;
    tokio::fs::write(session.sgx_manifest_path(), b"").await?;
    tokio::fs::write(session.signature_path(), b"").await?;

    let spec = signing_spec(session, &image.reference, &key_path, tuning);
    let stdout = runtime.execute(runner, &spec).await?;

    let measurement = MeasurementParser.parse(&stdout)?;

    for output in [session.sgx_manifest_path(), session.signature_path()] {
        if tokio::fs::metadata(&output).await?.len() == 0 {
            return Err(AppError::ExtractionError(format!(
                "signing produced an empty {}",
                output.display()
            )));
        }
    }

    tracing::info!(
        "[packager] signed manifest: mrenclave={} mrsigner={}",
        measurement.mrenclave,
        measurement.mrsigner
    );

    Ok(SignedManifest {
        measurement,
        signed_manifest_path: session.sgx_manifest_path(),
        signature_path: session.signature_path(),
    })
}
