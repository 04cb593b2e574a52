// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Container runtime command table.
//!
//! Builds [`Invocation`]s for the handful of runtime operations the pipeline
//! needs. Bind mounts are declared as [`Mount`] rows instead of concatenated
//! strings so the host/container wiring can be inspected and tested on its
//! own.
//!
//! Every `run` gets a `--name`. Killing the runtime client on a timeout does
//! not stop the container it started, so [`ContainerRuntime::execute`]
//! force-removes the named container before surfacing the timeout.

use std::path::PathBuf;

use crate::constants::{
    CONTAINER_RUNTIME_REMEDIATION, DEFAULT_CONTAINER_RUNTIME, WORKING_DIR_PREFIX,
};
use crate::errors::AppError;
use crate::preflight::assert_command;
use crate::process::{CommandRunner, Invocation, run_checked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

/// One `host path -> container path` bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub mode: MountMode,
}

impl Mount {
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: MountMode::ReadOnly,
        }
    }

    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: MountMode::ReadWrite,
        }
    }

    /// Value for the runtime's `-v` flag.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ValidationError`] for relative host paths, which
    /// runtimes would otherwise treat as named volumes, and for paths
    /// containing `:`, which the runtime splits the value on.
    pub fn volume_arg(&self) -> Result<String, AppError> {
        let host = self.host.display().to_string();
        if !self.host.is_absolute() {
            return Err(AppError::ValidationError(format!(
                "bind mount host path must be absolute: {host}"
            )));
        }
        if let Some(path) = [host.as_str(), self.container.as_str()]
            .into_iter()
            .find(|path| path.contains(':'))
        {
            return Err(AppError::ValidationError(format!(
                "bind mount path must not contain ':': {path}"
            )));
        }
        let suffix = match self.mode {
            MountMode::ReadOnly => ":ro",
            MountMode::ReadWrite => "",
        };
        Ok(format!("{host}:{}{suffix}", self.container))
    }
}

/// Parameters of a one-shot `run --rm` container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    /// Assigned by [`ContainerRuntime::execute`] when left empty.
    pub name: Option<String>,
    pub entrypoint: Option<String>,
    pub hostname: Option<String>,
    pub mounts: Vec<Mount>,
    pub env: Vec<(String, String)>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRuntime {
    binary: String,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_RUNTIME)
    }
}

impl ContainerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn version(&self) -> Invocation {
        Invocation::new(&self.binary).arg("version")
    }

    pub fn image_load(&self, archive: &std::path::Path) -> Invocation {
        Invocation::new(&self.binary)
            .args(["image", "load", "-i"])
            .arg(archive.display().to_string())
    }

    pub fn image_pull(&self, reference: &str) -> Invocation {
        Invocation::new(&self.binary).args(["image", "pull", reference])
    }

    /// Builds `run --rm -i` from a [`RunSpec`].
    ///
    /// # Errors
    ///
    /// Propagates [`Mount::volume_arg`] failures.
    pub fn run(&self, spec: &RunSpec) -> Result<Invocation, AppError> {
        let mut invocation = Invocation::new(&self.binary).args(["run", "--rm", "-i"]);
        if let Some(name) = &spec.name {
            invocation = invocation.args(["--name", name.as_str()]);
        }
        if let Some(hostname) = &spec.hostname {
            invocation = invocation.args(["--hostname", hostname.as_str()]);
        }
        if let Some(entrypoint) = &spec.entrypoint {
            invocation = invocation.args(["--entrypoint", entrypoint.as_str()]);
        }
        for (name, value) in &spec.env {
            invocation = invocation.arg("-e").arg(format!("{name}={value}"));
        }
        for mount in &spec.mounts {
            invocation = invocation.arg("-v").arg(mount.volume_arg()?);
        }
        Ok(invocation.arg(&spec.image).args(spec.args.iter().cloned()))
    }

    pub fn remove(&self, name: &str) -> Invocation {
        Invocation::new(&self.binary).args(["rm", "-f", name])
    }

    /// Runs `spec` to completion and returns its stdout.
    ///
    /// On [`AppError::TimeoutError`] the container is force-removed by name
    /// and the timeout is returned unchanged.
    ///
    /// # Errors
    ///
    /// Propagates [`ContainerRuntime::run`] and [`run_checked`] failures.
    pub async fn execute<R: CommandRunner>(
        &self,
        runner: &R,
        spec: &RunSpec,
    ) -> Result<String, AppError> {
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("{WORKING_DIR_PREFIX}-{:016x}", fastrand::u64(..)));
        let invocation = self.run(&RunSpec {
            name: Some(name.clone()),
            ..spec.clone()
        })?;

        match run_checked(runner, &invocation).await {
            Err(err @ AppError::TimeoutError(..)) => {
                tracing::warn!("[packager] removing timed out container {}", name);
                match runner.run(&self.remove(&name)).await {
                    Ok(output) if output.success() => {}
                    Ok(output) => tracing::warn!(
                        "[packager] could not remove container {}: {}",
                        name,
                        output.stderr.trim()
                    ),
                    Err(cleanup) => {
                        tracing::warn!("[packager] could not remove container {}: {}", name, cleanup);
                    }
                }
                Err(err)
            }
            result => result,
        }
    }

    /// Fails fast when the runtime is not installed or its daemon is down.
    pub async fn ensure_available<R: CommandRunner>(&self, runner: &R) -> Result<(), AppError> {
        assert_command(runner, &self.version(), CONTAINER_RUNTIME_REMEDIATION).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::process::ProcessOutput;

    /// Times out every `run` and records all invocations.
    #[derive(Default)]
    struct HangingRuntime {
        calls: Mutex<Vec<Invocation>>,
    }

    impl CommandRunner for HangingRuntime {
        async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, AppError> {
            self.calls.lock().unwrap().push(invocation.clone());
            if invocation.args.first().map(String::as_str) == Some("run") {
                return Err(AppError::TimeoutError(
                    invocation.to_string(),
                    Duration::from_secs(1),
                ));
            }
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_volume_arg_modes() {
        let ro = Mount::read_only("/keys/sign.key", "/sign.key");
        let rw = Mount::read_write("/work/out.sig", "/entrypoint.sig");
        assert_eq!(ro.volume_arg().unwrap(), "/keys/sign.key:/sign.key:ro");
        assert_eq!(rw.volume_arg().unwrap(), "/work/out.sig:/entrypoint.sig");
    }

    #[test]
    fn test_volume_arg_rejects_relative_host_path() {
        let mount = Mount::read_only("sign.key", "/sign.key");
        assert!(matches!(
            mount.volume_arg(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_volume_arg_rejects_colon_in_paths() {
        let host = Mount::read_only("/work/run:1/sign.key", "/sign.key");
        let container = Mount::read_write("/work/out.sig", "/out:put.sig");
        for mount in [host, container] {
            match mount.volume_arg() {
                Err(AppError::ValidationError(message)) => assert!(message.contains(':')),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_run_rejects_session_path_with_colon() {
        let spec = RunSpec {
            image: "base:latest".to_string(),
            mounts: vec![Mount::read_write("/tmp/run:2", "/mnt/host")],
            ..Default::default()
        };
        assert!(matches!(
            ContainerRuntime::default().run(&spec),
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_removes_container_after_timeout() {
        let runner = HangingRuntime::default();
        let spec = RunSpec {
            image: "base:latest".to_string(),
            ..Default::default()
        };

        let err = ContainerRuntime::default()
            .execute(&runner, &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TimeoutError(_, _)));

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[..4], ["run", "--rm", "-i", "--name"]);
        let name = &calls[0].args[4];
        assert!(name.starts_with("solution-packager-"));
        assert_eq!(calls[1].args, vec!["rm", "-f", name.as_str()]);
    }

    #[tokio::test]
    async fn test_execute_keeps_given_name() {
        let runner = HangingRuntime::default();
        let spec = RunSpec {
            image: "base:latest".to_string(),
            name: Some("signing-1".to_string()),
            ..Default::default()
        };

        let _ = ContainerRuntime::new("podman").execute(&runner, &spec).await;

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls[1].to_string(), "podman rm -f signing-1");
    }

    #[test]
    fn test_image_invocations() {
        let runtime = ContainerRuntime::new("podman");
        assert_eq!(runtime.version().to_string(), "podman version");
        assert_eq!(
            runtime.image_load(std::path::Path::new("/tmp/img.tar")).args,
            vec!["image", "load", "-i", "/tmp/img.tar"]
        );
        assert_eq!(
            runtime.image_pull("ghcr.io/org/base:1").args,
            vec!["image", "pull", "ghcr.io/org/base:1"]
        );
    }

    #[test]
    fn test_run_orders_flags_before_image() {
        let spec = RunSpec {
            image: "base:latest".to_string(),
            name: None,
            entrypoint: Some("/bin/sh".to_string()),
            hostname: Some("localhost".to_string()),
            mounts: vec![Mount::read_only("/work/script", "/script.sh")],
            env: vec![("SGX_THREAD_NUM".to_string(), "8".to_string())],
            args: vec!["/script.sh".to_string()],
        };
        let invocation = ContainerRuntime::default().run(&spec).unwrap();
        assert_eq!(invocation.program, "docker");
        assert_eq!(
            invocation.args,
            vec![
                "run",
                "--rm",
                "-i",
                "--hostname",
                "localhost",
                "--entrypoint",
                "/bin/sh",
                "-e",
                "SGX_THREAD_NUM=8",
                "-v",
                "/work/script:/script.sh:ro",
                "base:latest",
                "/script.sh",
            ]
        );
    }
}
