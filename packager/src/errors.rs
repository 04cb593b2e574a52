// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("{0}")]
    PreconditionError(String),
    #[error("input conflict: {0}")]
    InputConflictError(String),
    #[error("error running command `{command}`: {code:?} {stderr}")]
    RunError {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("error executing command `{0}`: {1}")]
    ExecError(String, String),
    #[error("command `{0}` timed out after {1:?}")]
    TimeoutError(String, Duration),
    #[error("extraction error: {0}")]
    ExtractionError(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("persistence error at {}: {reason}", .path.display())]
    PersistenceError {
        path: PathBuf,
        reason: String,
        /// Primary record that was fully written before the failure, if any.
        committed: Option<PathBuf>,
    },
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("io error: {0}")]
    IoError(String),
}

impl AppError {
    /// Stable category name used in machine-readable failure reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PreconditionError(_) => "precondition",
            Self::InputConflictError(_) => "input_conflict",
            Self::RunError { .. } | Self::ExecError(_, _) | Self::TimeoutError(_, _) => "execution",
            Self::ExtractionError(_) => "extraction",
            Self::ParseError(_) => "parse",
            Self::PersistenceError { .. } => "persistence",
            Self::ValidationError(_) => "validation",
            Self::IoError(_) => "io",
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::PersistenceError {
            path: path.into(),
            reason: source.to_string(),
            committed: None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(source: std::io::Error) -> Self {
        tracing::error!("{:?}", source);
        AppError::IoError(source.to_string())
    }
}

/// A stage failure together with the working directory left behind for
/// inspection.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("{source} (working directory retained at {})", .working_dir.display())]
pub struct PipelineError {
    pub working_dir: PathBuf,
    #[source]
    pub source: AppError,
}

impl PipelineError {
    pub fn new(working_dir: impl Into<PathBuf>, source: AppError) -> Self {
        Self {
            working_dir: working_dir.into(),
            source,
        }
    }

    pub fn report(&self) -> FailureReport<'_> {
        FailureReport {
            error: self.source.category(),
            message: self.source.to_string(),
            working_dir: Some(&self.working_dir),
            committed: match &self.source {
                AppError::PersistenceError { committed, .. } => committed.as_ref(),
                _ => None,
            },
        }
    }
}

/// JSON body printed by the binary when a command fails.
#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed: Option<&'a PathBuf>,
}

impl<'a> From<&'a AppError> for FailureReport<'a> {
    fn from(error: &'a AppError) -> Self {
        Self {
            error: error.category(),
            message: error.to_string(),
            working_dir: None,
            committed: None,
        }
    }
}
