// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Parsers for the textual output of external tools.
//!
//! Each tool gets its own [`OutputParser`] so a change in one tool's output
//! format is contained in one implementation. A parser only ever sees output
//! from a process that exited successfully; anything it cannot find is an
//! [`AppError::ParseError`].

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::OUTPUT_SEPARATOR;
use crate::errors::AppError;
use crate::models::Measurement;

static LOADED_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Loaded image: ([^\r\n]+)").expect("loaded image regex is valid"));
static LOADED_IMAGE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Loaded image ID: ([^\r\n]+)").expect("loaded image id regex is valid")
});
static MR_ENCLAVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mr_enclave:\s+([0-9a-fA-F]+)").expect("mr_enclave regex is valid"));
static MR_SIGNER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mr_signer:\s+([0-9a-fA-F]+)").expect("mr_signer regex is valid"));

pub trait OutputParser {
    type Output;

    fn parse(&self, stdout: &str) -> Result<Self::Output, AppError>;
}

/// Reads the image reference from `image load` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadedImageParser;

impl OutputParser for LoadedImageParser {
    type Output = String;

    fn parse(&self, stdout: &str) -> Result<String, AppError> {
        // Untagged archives only report an image ID.
        let reference = [&*LOADED_IMAGE_REGEX, &*LOADED_IMAGE_ID_REGEX]
            .into_iter()
            .find_map(|regex| regex.captures(stdout))
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim())
            .filter(|reference| !reference.is_empty());

        reference.map(str::to_string).ok_or_else(|| {
            AppError::ParseError(format!(
                "no `Loaded image:` line in image load output: {}",
                stdout.trim()
            ))
        })
    }
}

/// Reads the image reference from `image pull` output: the last non-blank
/// line, which is the resolved tag or digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulledImageParser;

impl OutputParser for PulledImageParser {
    type Output = String;

    fn parse(&self, stdout: &str) -> Result<String, AppError> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .next_back()
            .map(str::to_string)
            .ok_or_else(|| AppError::ParseError("image pull produced no output".to_string()))
    }
}

/// Reads MRENCLAVE and MRSIGNER from the signing script output.
///
/// Only the part after [`OUTPUT_SEPARATOR`] is searched when the separator is
/// present, so nothing printed by the sign step can be mistaken for the
/// token tool's measurement lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementParser;

impl OutputParser for MeasurementParser {
    type Output = Measurement;

    fn parse(&self, stdout: &str) -> Result<Measurement, AppError> {
        let section = stdout
            .split_once(OUTPUT_SEPARATOR)
            .map_or(stdout, |(_, after)| after);

        let capture = |regex: &Regex| {
            regex
                .captures(section)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        let mrenclave = capture(&MR_ENCLAVE_REGEX);
        let mrsigner = capture(&MR_SIGNER_REGEX);

        if mrenclave.is_empty() || mrsigner.is_empty() {
            return Err(AppError::ParseError(
                "Could not parse MRENCLAVE and MRSIGNER".to_string(),
            ));
        }

        Measurement::new(&mrenclave, &mrsigner)
    }
}
