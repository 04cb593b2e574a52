// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{ENV_SGX_ENCLAVE_SIZE, ENV_SGX_STACK_SIZE, ENV_SGX_THREAD_NUM};
use crate::errors::AppError;

/// Enclave measurement recovered from the signing toolchain.
///
/// Both identifiers are guaranteed non-empty lowercase hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub mrenclave: String,
    pub mrsigner: String,
}

impl Measurement {
    /// Builds a measurement from raw tool output fragments, lower-casing both.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ParseError`] if either value is empty or not hex.
    pub fn new(mrenclave: &str, mrsigner: &str) -> Result<Self, AppError> {
        Ok(Self {
            mrenclave: normalize_hex("mr_enclave", mrenclave)?,
            mrsigner: normalize_hex("mr_signer", mrsigner)?,
        })
    }
}

fn normalize_hex(name: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ParseError(format!("{name} is empty")));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::ParseError(format!(
            "{name} is not hexadecimal: {value}"
        )));
    }
    Ok(value.to_ascii_lowercase())
}

/// Where the base image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseImageSource {
    /// Local image archive passed to `image load`.
    Archive(PathBuf),
    /// Remote reference passed to `image pull`.
    Reference(String),
}

impl BaseImageSource {
    /// Picks the image source, preferring the archive when both are set.
    ///
    /// Blank values count as absent.
    pub fn select(path: Option<&PathBuf>, reference: Option<&str>) -> Result<Self, AppError> {
        if let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(Self::Archive(path.clone()));
        }
        if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
            return Ok(Self::Reference(reference.to_string()));
        }
        Err(AppError::InputConflictError(
            "Base image and resource were not provided".to_string(),
        ))
    }
}

/// A loaded or pulled image together with the manifest embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub reference: String,
    pub manifest: Vec<u8>,
}

/// Output of a signing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedManifest {
    pub measurement: Measurement,
    pub signed_manifest_path: PathBuf,
    pub signature_path: PathBuf,
}

/// Enclave sizing parameters forwarded opaquely to the container runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveTuning {
    pub enclave_size: Option<String>,
    pub thread_num: Option<String>,
    pub stack_size: Option<String>,
}

impl EnclaveTuning {
    /// Environment variables for the values that are set.
    pub fn env(&self) -> Vec<(String, String)> {
        [
            (ENV_SGX_ENCLAVE_SIZE, &self.enclave_size),
            (ENV_SGX_THREAD_NUM, &self.thread_num),
            (ENV_SGX_STACK_SIZE, &self.stack_size),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
        .collect()
    }
}

/// Inputs for one preparation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareRequest {
    pub solution_path: PathBuf,
    pub key_path: PathBuf,
    pub base_image_path: Option<PathBuf>,
    pub base_image_reference: Option<String>,
    pub write_default_manifest: bool,
    pub tuning: EnclaveTuning,
}

impl PrepareRequest {
    /// Enforces that exactly one image source is supplied.
    pub fn image_source(&self) -> Result<BaseImageSource, AppError> {
        let has_path = self
            .base_image_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty());
        let has_reference = self
            .base_image_reference
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());

        match (has_path, has_reference) {
            (true, true) => Err(AppError::InputConflictError(
                "base image path and base image resource are mutually exclusive".to_string(),
            )),
            (false, false) => Err(AppError::InputConflictError(
                "one of base image path or base image resource is required".to_string(),
            )),
            _ => BaseImageSource::select(
                self.base_image_path.as_ref(),
                self.base_image_reference.as_deref(),
            ),
        }
    }
}

/// Successful pipeline result reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedSolution {
    pub solution_metadata_path: PathBuf,
    pub mrenclave: String,
    pub mrsigner: String,
    pub working_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_lowercases() {
        let m = Measurement::new("ABCDEF01", "0a0B").unwrap();
        assert_eq!(m.mrenclave, "abcdef01");
        assert_eq!(m.mrsigner, "0a0b");
    }

    #[test]
    fn test_measurement_rejects_empty_and_non_hex() {
        assert!(matches!(
            Measurement::new("", "aa"),
            Err(AppError::ParseError(_))
        ));
        assert!(matches!(
            Measurement::new("aa", "zz"),
            Err(AppError::ParseError(_))
        ));
    }

    #[test]
    fn test_select_prefers_archive() {
        let path = PathBuf::from("/tmp/img.tar");
        let source = BaseImageSource::select(Some(&path), Some("repo/image:1")).unwrap();
        assert_eq!(source, BaseImageSource::Archive(path));
    }

    #[test]
    fn test_select_treats_blank_as_absent() {
        let empty = PathBuf::new();
        let source = BaseImageSource::select(Some(&empty), Some(" repo/image:1 ")).unwrap();
        assert_eq!(source, BaseImageSource::Reference("repo/image:1".to_string()));
        assert!(matches!(
            BaseImageSource::select(Some(&empty), Some("  ")),
            Err(AppError::InputConflictError(_))
        ));
    }

    #[test]
    fn test_request_rejects_both_and_neither() {
        let mut request = PrepareRequest {
            base_image_path: Some(PathBuf::from("/tmp/img.tar")),
            base_image_reference: Some("repo/image:1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            request.image_source(),
            Err(AppError::InputConflictError(_))
        ));

        request.base_image_path = None;
        request.base_image_reference = None;
        assert!(matches!(
            request.image_source(),
            Err(AppError::InputConflictError(_))
        ));
    }

    #[test]
    fn test_tuning_env_skips_unset_values() {
        let tuning = EnclaveTuning {
            enclave_size: Some("4G".to_string()),
            thread_num: None,
            stack_size: Some("8M".to_string()),
        };
        assert_eq!(
            tuning.env(),
            vec![
                ("SGX_ENCLAVE_SIZE".to_string(), "4G".to_string()),
                ("SGX_STACK_SIZE".to_string(), "8M".to_string()),
            ]
        );
    }
}
