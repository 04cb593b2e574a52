// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Solution preparation pipeline.
//!
//! Runs the three stages strictly in order and stops at the first failure:
//!
//! 1. [`extract_manifest`]: resolve the base image and copy its manifest out
//! 2. [`sign_manifest`]: sign it inside the image and read the measurement
//! 3. [`MetadataStore::commit`]: store the signed artifacts in the solution
//!
//! Every failure is returned as a [`PipelineError`] naming the working
//! directory, which is left in place.

use crate::container::ContainerRuntime;
use crate::errors::{AppError, PipelineError};
use crate::metadata::MetadataStore;
use crate::models::{PrepareRequest, PreparedSolution};
use crate::process::CommandRunner;
use crate::resolver::extract_manifest;
use crate::session::WorkingSession;
use crate::signer::sign_manifest;

pub struct Packager<R> {
    runner: R,
    runtime: ContainerRuntime,
}

impl<R: CommandRunner> Packager<R> {
    pub fn new(runner: R, runtime: ContainerRuntime) -> Self {
        Self { runner, runtime }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Prepares the solution described by `request` inside `session`.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure wrapped in a [`PipelineError`].
    #[tracing::instrument(skip(self, session), fields(working_dir = %session.root().display()))]
    pub async fn prepare(
        &self,
        request: &PrepareRequest,
        session: &WorkingSession,
    ) -> Result<PreparedSolution, PipelineError> {
        self.run_stages(request, session)
            .await
            .map_err(|err| {
                tracing::error!("[packager] preparation failed: {}", err);
                PipelineError::new(session.root(), err)
            })
    }

    async fn run_stages(
        &self,
        request: &PrepareRequest,
        session: &WorkingSession,
    ) -> Result<PreparedSolution, AppError> {
        let source = request.image_source()?;

        let image = extract_manifest(
            &self.runner,
            &self.runtime,
            session,
            &source,
            &request.tuning,
        )
        .await?;

        let signed = sign_manifest(
            &self.runner,
            &self.runtime,
            session,
            &image,
            &request.key_path,
            &request.tuning,
        )
        .await?;

        let store = MetadataStore::open(&request.solution_path).await?;
        let solution_metadata_path = store
            .commit(&signed, request.write_default_manifest)
            .await?;

        Ok(PreparedSolution {
            solution_metadata_path,
            mrenclave: signed.measurement.mrenclave,
            mrsigner: signed.measurement.mrsigner,
            working_dir: session.root().to_path_buf(),
        })
    }
}
