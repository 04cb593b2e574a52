// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Scratch directory for a single preparation run.
//!
//! A [`WorkingSession`] is never deleted by this crate. On failure the
//! directory holds the exact script, manifest and placeholders that were
//! mounted into the container, so the failing command can be reproduced by
//! hand. Callers may remove it themselves after a successful run.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{
    EXTRACTED_MANIFEST_FILE, MANIFEST_FILE, SCRIPT_FILE, SGX_MANIFEST_TMP_FILE,
    SIGNATURE_TMP_FILE, WORKING_DIR_PREFIX,
};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSession {
    root: PathBuf,
    created_at: SystemTime,
}

impl WorkingSession {
    /// Creates the session directory.
    ///
    /// Uses `dir` when given (creating it if absent), otherwise allocates a
    /// fresh directory under the system temp dir. The stored root is always
    /// absolute and symlink-free because it is bind-mounted into containers.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::IoError`] if the directory cannot be created or
    /// resolved.
    #[tracing::instrument]
    pub async fn create(dir: Option<PathBuf>) -> Result<Self, AppError> {
        let created_at = SystemTime::now();
        let dir = match dir {
            Some(dir) => dir,
            None => std::env::temp_dir().join(unique_name(created_at)),
        };

        tokio::fs::create_dir_all(&dir).await?;
        let root = tokio::fs::canonicalize(&dir).await?;

        tracing::info!("[packager] working directory: {}", root.display());

        Ok(Self { root, created_at })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn signature_path(&self) -> PathBuf {
        self.root.join(SIGNATURE_TMP_FILE)
    }

    pub fn sgx_manifest_path(&self) -> PathBuf {
        self.root.join(SGX_MANIFEST_TMP_FILE)
    }

    pub fn extracted_manifest_path(&self) -> PathBuf {
        self.root.join(EXTRACTED_MANIFEST_FILE)
    }
}

fn unique_name(now: SystemTime) -> String {
    let millis = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!(
        "{}-{}-{:08x}",
        WORKING_DIR_PREFIX,
        millis,
        fastrand::u32(..)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_uses_supplied_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("work");

        let session = WorkingSession::create(Some(dir.clone())).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(session.root(), std::fs::canonicalize(&dir).unwrap());
        assert!(session.root().is_absolute());
    }

    #[tokio::test]
    async fn test_create_allocates_distinct_directories() {
        let first = WorkingSession::create(None).await.unwrap();
        let second = WorkingSession::create(None).await.unwrap();

        assert_ne!(first.root(), second.root());
        assert!(
            first
                .root()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(WORKING_DIR_PREFIX)
        );

        std::fs::remove_dir_all(first.root()).unwrap();
        std::fs::remove_dir_all(second.root()).unwrap();
    }

    #[tokio::test]
    async fn test_artifact_paths_live_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let session = WorkingSession::create(Some(tmp.path().to_path_buf()))
            .await
            .unwrap();

        for path in [
            session.script_path(),
            session.manifest_path(),
            session.signature_path(),
            session.sgx_manifest_path(),
            session.extracted_manifest_path(),
        ] {
            assert_eq!(path.parent().unwrap(), session.root());
        }
        assert!(session.signature_path().ends_with("entrypoint.sig.tmp"));
    }
}
