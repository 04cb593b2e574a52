// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Measurement-keyed metadata store inside a solution directory.
//!
//! # Layout
//!
//! ```text
//! <solution>/.solution-metadata/sgx-gramine/manifests/mrenclave/
//! ├── <mrenclave>/
//! │   ├── entrypoint.manifest.sgx
//! │   └── entrypoint.sig
//! └── _/                          (only with the default manifest policy)
//!     ├── entrypoint.manifest.sgx
//!     └── entrypoint.sig
//! ```
//!
//! Writes are not rolled back. If the wildcard copy fails after the primary
//! record was written, the primary record stays and is reported in the
//! error.

use std::path::{Path, PathBuf};

use crate::constants::{
    METADATA_DIR, METADATA_MANIFESTS_DIR, METADATA_MRENCLAVE_DIR, METADATA_PLATFORM_DIR,
    SIGNATURE_FILE, SIGNED_MANIFEST_FILE, WILDCARD_KEY,
};
use crate::errors::AppError;
use crate::models::SignedManifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStore {
    solution_root: PathBuf,
}

impl MetadataStore {
    /// Opens the store of the solution at `solution_path`, creating the
    /// solution directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the directory cannot be
    /// created or resolved.
    pub async fn open(solution_path: &Path) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(solution_path)
            .await
            .map_err(|err| AppError::persistence(solution_path, &err))?;
        let solution_root = tokio::fs::canonicalize(solution_path)
            .await
            .map_err(|err| AppError::persistence(solution_path, &err))?;

        Ok(Self { solution_root })
    }

    pub fn solution_root(&self) -> &Path {
        &self.solution_root
    }

    /// Parent directory of every record.
    pub fn records_dir(&self) -> PathBuf {
        self.solution_root
            .join(METADATA_DIR)
            .join(METADATA_PLATFORM_DIR)
            .join(METADATA_MANIFESTS_DIR)
            .join(METADATA_MRENCLAVE_DIR)
    }

    pub fn record_dir(&self, key: &str) -> PathBuf {
        self.records_dir().join(key)
    }

    /// Copies the signed artifacts under `mrenclave/<mrenclave>/` and, when
    /// `write_default_manifest` is set, under the wildcard key as well.
    ///
    /// Returns the measurement-keyed record directory.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ValidationError`] if the measurement collides with
    /// the wildcard key and [`AppError::PersistenceError`] if a directory or
    /// copy operation fails.
    #[tracing::instrument(skip(self, signed), fields(mrenclave = %signed.measurement.mrenclave))]
    pub async fn commit(
        &self,
        signed: &SignedManifest,
        write_default_manifest: bool,
    ) -> Result<PathBuf, AppError> {
        let mrenclave = &signed.measurement.mrenclave;
        validate_record_key(mrenclave)?;

        let primary = self.write_record(mrenclave, signed).await?;
        tracing::info!("[packager] wrote metadata record {}", primary.display());

        if write_default_manifest {
            match self.write_record(WILDCARD_KEY, signed).await {
                Ok(default) => {
                    tracing::info!("[packager] wrote default metadata record {}", default.display());
                }
                Err(AppError::PersistenceError { path, reason, .. }) => {
                    tracing::error!(
                        "[packager] default record failed, {} remains valid",
                        primary.display()
                    );
                    return Err(AppError::PersistenceError {
                        path,
                        reason,
                        committed: Some(primary),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(primary)
    }

    async fn write_record(&self, key: &str, signed: &SignedManifest) -> Result<PathBuf, AppError> {
        let dir = self.record_dir(key);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| AppError::persistence(&dir, &err))?;

        for (source, name) in [
            (&signed.signed_manifest_path, SIGNED_MANIFEST_FILE),
            (&signed.signature_path, SIGNATURE_FILE),
        ] {
            let target = dir.join(name);
            tokio::fs::copy(source, &target)
                .await
                .map_err(|err| AppError::persistence(&target, &err))?;
        }

        Ok(dir)
    }
}

fn validate_record_key(mrenclave: &str) -> Result<(), AppError> {
    if mrenclave == WILDCARD_KEY {
        return Err(AppError::ValidationError(format!(
            "mrenclave collides with the reserved wildcard key `{WILDCARD_KEY}`"
        )));
    }
    if mrenclave.is_empty() || !mrenclave.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::ValidationError(format!(
            "mrenclave is not a hexadecimal record key: `{mrenclave}`"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;

    async fn signed_fixture(dir: &Path, mrenclave: &str) -> SignedManifest {
        let signed_manifest_path = dir.join("entrypoint.manifest.sgx.tmp");
        let signature_path = dir.join("entrypoint.sig.tmp");
        tokio::fs::write(&signed_manifest_path, b"sgx-manifest").await.unwrap();
        tokio::fs::write(&signature_path, b"sigstruct").await.unwrap();
        SignedManifest {
            measurement: Measurement {
                mrenclave: mrenclave.to_string(),
                mrsigner: "beef".to_string(),
            },
            signed_manifest_path,
            signature_path,
        }
    }

    fn record_names(store: &MetadataStore) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(store.records_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_commit_without_default_writes_one_record() {
        let work = tempfile::tempdir().unwrap();
        let solution = tempfile::tempdir().unwrap();
        let signed = signed_fixture(work.path(), "abc123").await;

        let store = MetadataStore::open(solution.path()).await.unwrap();
        let primary = store.commit(&signed, false).await.unwrap();

        assert_eq!(primary, store.record_dir("abc123"));
        assert!(primary.ends_with(".solution-metadata/sgx-gramine/manifests/mrenclave/abc123"));
        assert_eq!(record_names(&store), vec!["abc123"]);
        assert_eq!(
            std::fs::read(primary.join("entrypoint.manifest.sgx")).unwrap(),
            b"sgx-manifest"
        );
        assert_eq!(std::fs::read(primary.join("entrypoint.sig")).unwrap(), b"sigstruct");
    }

    #[tokio::test]
    async fn test_commit_with_default_writes_wildcard_copy() {
        let work = tempfile::tempdir().unwrap();
        let solution = tempfile::tempdir().unwrap();
        let signed = signed_fixture(work.path(), "abc123").await;

        let store = MetadataStore::open(solution.path()).await.unwrap();
        let primary = store.commit(&signed, true).await.unwrap();

        assert_eq!(primary, store.record_dir("abc123"));
        assert_eq!(record_names(&store), vec!["_", "abc123"]);
        for name in ["entrypoint.manifest.sgx", "entrypoint.sig"] {
            assert_eq!(
                std::fs::read(primary.join(name)).unwrap(),
                std::fs::read(store.record_dir("_").join(name)).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_commit_rejects_wildcard_measurement() {
        let work = tempfile::tempdir().unwrap();
        let solution = tempfile::tempdir().unwrap();
        let signed = signed_fixture(work.path(), "_").await;

        let store = MetadataStore::open(solution.path()).await.unwrap();
        let err = store.commit(&signed, true).await.unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!store.records_dir().exists());
    }

    #[tokio::test]
    async fn test_open_creates_missing_solution_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let solution = tmp.path().join("new-solution");

        let store = MetadataStore::open(&solution).await.unwrap();

        assert!(solution.is_dir());
        assert!(store.solution_root().is_absolute());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_persistence_error() {
        let work = tempfile::tempdir().unwrap();
        let solution = tempfile::tempdir().unwrap();
        let mut signed = signed_fixture(work.path(), "abc123").await;
        signed.signature_path = work.path().join("missing.sig");

        let store = MetadataStore::open(solution.path()).await.unwrap();
        let err = store.commit(&signed, false).await.unwrap_err();

        match err {
            AppError::PersistenceError {
                path, committed, ..
            } => {
                assert!(path.ends_with("abc123/entrypoint.sig"));
                assert_eq!(committed, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_record_failure_reports_committed_primary() {
        let work = tempfile::tempdir().unwrap();
        let solution = tempfile::tempdir().unwrap();
        let signed = signed_fixture(work.path(), "abc123").await;
        let store = MetadataStore::open(solution.path()).await.unwrap();

        // A plain file where the wildcard directory should go.
        std::fs::create_dir_all(store.records_dir()).unwrap();
        std::fs::write(store.record_dir("_"), b"blocker").unwrap();

        let err = store.commit(&signed, true).await.unwrap_err();

        match err {
            AppError::PersistenceError { committed, .. } => {
                assert_eq!(committed, Some(store.record_dir("abc123")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.record_dir("abc123").join("entrypoint.sig").is_file());
    }
}
