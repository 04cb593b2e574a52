// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::constants::DEFAULT_CONTAINER_RUNTIME;
use crate::models::{EnclaveTuning, PrepareRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct PackagerOptions {
    /// Container runtime executable
    #[arg(long, global = true, default_value = DEFAULT_CONTAINER_RUNTIME, env("PACKAGER_DOCKER_BIN"))]
    pub docker_bin: String,
    /// Kill any external command running longer than this
    #[arg(long, global = true, env("PACKAGER_TIMEOUT_SECS"))]
    pub timeout_secs: Option<u64>,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json, env("PACKAGER_LOG_FORMAT"))]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: PackagerCommand,
}

impl PackagerOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum PackagerCommand {
    /// Sign the base image manifest and store it in the solution metadata
    Prepare(PrepareOptions),
    /// Generate a solution signing key
    GenerateKey(GenerateKeyOptions),
}

#[derive(Debug, Clone, Args)]
pub struct PrepareOptions {
    #[arg(long, env("PACKAGER_SOLUTION_PATH"))]
    pub solution_path: PathBuf,
    #[arg(long, env("PACKAGER_KEY_PATH"))]
    pub key_path: PathBuf,
    #[arg(long, env("PACKAGER_BASE_IMAGE_PATH"), conflicts_with = "base_image_resource", required_unless_present = "base_image_resource")]
    pub base_image_path: Option<PathBuf>,
    #[arg(long, env("PACKAGER_BASE_IMAGE_RESOURCE"))]
    pub base_image_resource: Option<String>,
    #[arg(long, default_value = "false", env("PACKAGER_WRITE_DEFAULT_MANIFEST"), action = ArgAction::SetTrue)]
    pub write_default_manifest: bool,
    /// Reuse this directory instead of allocating one under the temp dir
    #[arg(long, env("PACKAGER_WORKING_DIR"))]
    pub working_dir: Option<PathBuf>,
    #[arg(long, env("PACKAGER_SGX_ENCLAVE_SIZE"))]
    pub sgx_enclave_size: Option<String>,
    #[arg(long, env("PACKAGER_SGX_THREAD_NUM"))]
    pub sgx_thread_num: Option<String>,
    #[arg(long, env("PACKAGER_SGX_STACK_SIZE"))]
    pub sgx_stack_size: Option<String>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        PrepareOptions {
            solution_path: PathBuf::from("."),
            key_path: PathBuf::from("solution.key"),
            base_image_path: None,
            base_image_resource: None,
            write_default_manifest: false,
            working_dir: None,
            sgx_enclave_size: None,
            sgx_thread_num: None,
            sgx_stack_size: None,
        }
    }
}

impl From<&PrepareOptions> for PrepareRequest {
    fn from(options: &PrepareOptions) -> Self {
        PrepareRequest {
            solution_path: options.solution_path.clone(),
            key_path: options.key_path.clone(),
            base_image_path: options.base_image_path.clone(),
            base_image_reference: options.base_image_resource.clone(),
            write_default_manifest: options.write_default_manifest,
            tuning: EnclaveTuning {
                enclave_size: options.sgx_enclave_size.clone(),
                thread_num: options.sgx_thread_num.clone(),
                stack_size: options.sgx_stack_size.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GenerateKeyOptions {
    #[arg(long, env("PACKAGER_KEY_OUTPUT"))]
    pub output: PathBuf,
}
