//! `docker` command construction and bounded execution.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use workerscale_core::{ComposeSettings, ServiceIdentity};

/// Builds and runs `docker` / `docker compose` invocations for one
/// compose manifest.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
    compose_file: PathBuf,
    project_directory: Option<PathBuf>,
}

impl ComposeCli {
    pub fn new(settings: &ComposeSettings) -> Self {
        Self {
            program: "docker".to_string(),
            base_args: Vec::new(),
            compose_file: settings.compose_file.clone(),
            project_directory: settings.project_directory.clone(),
        }
    }

    /// Run a different executable in place of `docker`, with fixed leading
    /// arguments (e.g. `sudo` + `["docker"]`).
    pub fn with_program<I, S>(mut self, program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.base_args = base_args.into_iter().map(Into::into).collect();
        self
    }

    pub fn compose_file(&self) -> &PathBuf {
        &self.compose_file
    }

    /// `compose` plus the manifest and project flags shared by every
    /// compose subcommand, so validation and scaling resolve relative paths
    /// against the same base.
    fn compose_args(&self, service: &ServiceIdentity) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
            "--project-name".to_string(),
            service.project.clone(),
        ];
        if let Some(dir) = &self.project_directory {
            args.push("--project-directory".to_string());
            args.push(dir.display().to_string());
        }
        args
    }

    /// Arguments converging `service` to `target` replicas.
    pub fn scale_args(&self, service: &ServiceIdentity, target: u32) -> Vec<String> {
        let mut args = self.compose_args(service);
        args.extend([
            "up".to_string(),
            "-d".to_string(),
            "--no-deps".to_string(),
            "--scale".to_string(),
            format!("{}={target}", service.service),
            service.service.clone(),
        ]);
        args
    }

    /// Arguments listing running containers of `service`, one id per line.
    pub fn ps_args(&self, service: &ServiceIdentity) -> Vec<String> {
        vec![
            "ps".to_string(),
            "--quiet".to_string(),
            "--filter".to_string(),
            format!("label=com.docker.compose.service={}", service.service),
            "--filter".to_string(),
            format!("label=com.docker.compose.project={}", service.project),
            "--filter".to_string(),
            "status=running".to_string(),
        ]
    }

    /// Arguments validating the compose manifest.
    pub fn config_args(&self, service: &ServiceIdentity) -> Vec<String> {
        let mut args = self.compose_args(service);
        args.extend(["config".to_string(), "--quiet".to_string()]);
        args
    }

    /// Human-readable command line, for logs.
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run with captured output. The child is killed if `timeout` elapses.
    pub(crate) async fn run(&self, args: &[String], timeout: Duration) -> Result<Captured, RunError> {
        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RunError::NotFound(self.program.clone()),
                _ => RunError::Io(e),
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(Captured {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Ok(Err(e)) => Err(RunError::Io(e)),
            Err(_) => Err(RunError::TimedOut(timeout)),
        }
    }
}

/// Output of a finished command.
#[derive(Debug)]
pub(crate) struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub(crate) enum RunError {
    NotFound(String),
    TimedOut(Duration),
    Io(std::io::Error),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    pub(crate) fn settings(dir: Option<&str>) -> ComposeSettings {
        ComposeSettings {
            compose_file: PathBuf::from("/app/docker-compose.yml"),
            project_directory: dir.map(PathBuf::from),
            service: ServiceIdentity::new("automation", "n8n-worker"),
        }
    }

    /// A `ComposeCli` that runs `body` as a shell script instead of docker.
    ///
    /// The script is interpreted by `sh` rather than executed directly, so
    /// there is no exec-after-write race with other test threads.
    pub(crate) fn stub_cli(dir: &Path, body: &str) -> ComposeCli {
        let script = dir.join("docker.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        ComposeCli::new(&settings(None)).with_program("sh", [script.display().to_string()])
    }

    #[test]
    fn scale_args_without_project_directory() {
        let cli = ComposeCli::new(&settings(None));
        let service = ServiceIdentity::new("automation", "n8n-worker");

        assert_eq!(
            cli.scale_args(&service, 3),
            vec![
                "compose",
                "-f",
                "/app/docker-compose.yml",
                "--project-name",
                "automation",
                "up",
                "-d",
                "--no-deps",
                "--scale",
                "n8n-worker=3",
                "n8n-worker",
            ]
        );
    }

    #[test]
    fn scale_args_with_project_directory() {
        let cli = ComposeCli::new(&settings(Some("/app")));
        let args = cli.scale_args(&ServiceIdentity::new("automation", "n8n-worker"), 0);

        let pos = args.iter().position(|a| a == "--project-directory").unwrap();
        assert_eq!(args[pos + 1], "/app");
        assert!(pos < args.iter().position(|a| a == "up").unwrap());
        assert!(args.contains(&"n8n-worker=0".to_string()));
    }

    #[test]
    fn ps_args_filter_by_both_labels() {
        let cli = ComposeCli::new(&settings(None));
        let args = cli.ps_args(&ServiceIdentity::new("automation", "n8n-worker"));

        assert!(args.contains(&"label=com.docker.compose.service=n8n-worker".to_string()));
        assert!(args.contains(&"label=com.docker.compose.project=automation".to_string()));
        assert!(args.contains(&"status=running".to_string()));
    }

    #[test]
    fn command_line_includes_base_args() {
        let cli = ComposeCli::new(&settings(None)).with_program("sudo", ["docker"]);
        let service = ServiceIdentity::new("automation", "n8n-worker");
        assert_eq!(
            cli.command_line(&cli.config_args(&service)),
            "sudo docker compose -f /app/docker-compose.yml --project-name automation config --quiet"
        );
    }

    #[test]
    fn config_and_scale_share_project_flags() {
        let cli = ComposeCli::new(&settings(Some("/srv/automation")));
        let service = ServiceIdentity::new("automation", "n8n-worker");

        let config = cli.config_args(&service);
        let scale = cli.scale_args(&service, 2);

        assert_eq!(
            &config[..7],
            [
                "compose",
                "-f",
                "/app/docker-compose.yml",
                "--project-name",
                "automation",
                "--project-directory",
                "/srv/automation",
            ]
        );
        assert_eq!(config[..7], scale[..7]);
        assert_eq!(&config[7..], ["config", "--quiet"]);
    }

    #[tokio::test]
    async fn run_captures_trimmed_output() {
        let dir = tempfile::tempdir().unwrap();
        let cli = stub_cli(dir.path(), "echo \"  out  \"; echo err >&2; exit 0");

        let captured = cli.run(&[], Duration::from_secs(5)).await.unwrap();
        assert!(captured.status.success());
        assert_eq!(captured.stdout, "out");
        assert_eq!(captured.stderr, "err");
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let cli = ComposeCli::new(&settings(None))
            .with_program("/nonexistent/docker", Vec::<String>::new());
        let err = cli.run(&[], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RunError::NotFound(p) if p == "/nonexistent/docker"));
    }

    #[tokio::test]
    async fn run_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let cli = stub_cli(dir.path(), "sleep 5");

        let err = cli.run(&[], Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, RunError::TimedOut(_)));
    }
}
