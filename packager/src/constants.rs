// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";
pub const CONTAINER_RUNTIME_REMEDIATION: &str =
    "Docker was not found in PATH, please verify that Docker is installed";

pub const OPENSSL_BINARY: &str = "openssl";
pub const OPENSSL_REMEDIATION: &str =
    "OpenSSL was not found in PATH, please verify that OpenSSL is installed";
/// Gramine requires a 3072-bit RSA key with public exponent 3.
pub const SIGNING_KEY_BITS: &str = "3072";

pub const WORKING_DIR_PREFIX: &str = "solution-packager";

// Well-known working directory file names
pub const SCRIPT_FILE: &str = "entrypoint.script";
pub const MANIFEST_FILE: &str = "entrypoint.manifest";
pub const SIGNATURE_TMP_FILE: &str = "entrypoint.sig.tmp";
pub const SGX_MANIFEST_TMP_FILE: &str = "entrypoint.manifest.sgx.tmp";
pub const EXTRACTED_MANIFEST_FILE: &str = "baseSolution.manifest";

// Paths inside the base image
pub const IMAGE_MANIFEST_PATH: &str = "/gramine/app_files/entrypoint.manifest";
pub const HOST_MOUNT_POINT: &str = "/mnt/host";
pub const CONTAINER_SHELL: &str = "/bin/sh";
pub const CONTAINER_HOSTNAME: &str = "localhost";
pub const CONTAINER_KEY_PATH: &str = "/sign.key";
pub const CONTAINER_SCRIPT_PATH: &str = "/script.sh";
pub const CONTAINER_MANIFEST_PATH: &str = "/entrypoint.manifest";
pub const CONTAINER_SGX_MANIFEST_PATH: &str = "/entrypoint.manifest.sgx";
pub const CONTAINER_SIGNATURE_PATH: &str = "/entrypoint.sig";
pub const CONTAINER_TOKEN_PATH: &str = "/entrypoint.token";
pub const GRAMINE_BUILD_LIB_DIR: &str = "/gramine/meson_build_output/lib";

/// Printed by the signing script between the sign and get-token steps.
pub const OUTPUT_SEPARATOR: &str = "============= gramine-sgx-get-token ================";

// Metadata store layout: <solution>/.solution-metadata/sgx-gramine/manifests/mrenclave/<key>/
pub const METADATA_DIR: &str = ".solution-metadata";
pub const METADATA_PLATFORM_DIR: &str = "sgx-gramine";
pub const METADATA_MANIFESTS_DIR: &str = "manifests";
pub const METADATA_MRENCLAVE_DIR: &str = "mrenclave";
pub const SIGNED_MANIFEST_FILE: &str = "entrypoint.manifest.sgx";
pub const SIGNATURE_FILE: &str = "entrypoint.sig";
/// Record key matched by consumers that do not pin MRENCLAVE.
pub const WILDCARD_KEY: &str = "_";

// Pass-through enclave tuning variables
pub const ENV_SGX_ENCLAVE_SIZE: &str = "SGX_ENCLAVE_SIZE";
pub const ENV_SGX_THREAD_NUM: &str = "SGX_THREAD_NUM";
pub const ENV_SGX_STACK_SIZE: &str = "SGX_STACK_SIZE";
