// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Solution Packager
//!
//! Packages a Gramine SGX solution for confidential execution.
//!
//! Given a base container image (a local archive or a pull reference) and a
//! signing key, this crate extracts the image's embedded Gramine manifest,
//! signs it with the toolchain shipped inside the image, recovers the
//! resulting MRENCLAVE/MRSIGNER measurement, and stores the signed artifacts
//! in a measurement-keyed metadata tree inside the solution directory.
//!
//! ## Architecture
//!
//! ```text
//! base image --> resolver --> signer --> metadata store
//!                   |            |
//!                   +------------+-> container runtime (docker)
//! ```
//!
//! All external tools are reached through [`process::CommandRunner`], so
//! every stage can be exercised with a scripted runner.
//!
//! ## Modules
//!
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: file names, container paths and metadata layout
//! - [`container`]: container runtime invocations and bind mount table
//! - [`errors`]: error taxonomy and failure reports
//! - [`keygen`]: signing key generation with `openssl`
//! - [`metadata`]: measurement-keyed metadata store writer
//! - [`models`]: measurement, image and request/result types
//! - [`parsers`]: parsers for runtime and signing tool output
//! - [`pipeline`]: the end-to-end preparation pipeline
//! - [`preflight`]: external command availability checks
//! - [`process`]: external process execution
//! - [`resolver`]: base image resolution and manifest extraction
//! - [`session`]: per-run working directory
//! - [`signer`]: manifest signing inside the base image
//!
//! ## Usage
//!
//! ```bash
//! solution-packager prepare --solution-path ./solution --key-path ./solution.key \
//!     --base-image-path ./base-image.tar --write-default-manifest
//! ```
//!
//! ## Concurrency
//!
//! One preparation run is strictly sequential. Concurrent runs against the
//! same solution directory are not coordinated; callers must serialize them.

pub mod configuration;
pub mod constants;
pub mod container;
pub mod errors;
pub mod keygen;
pub mod metadata;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod resolver;
pub mod session;
pub mod signer;
