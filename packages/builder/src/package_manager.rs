// ABOUTME: Dependency installer abstraction and the default pnpm-backed implementation
// ABOUTME: Runs package manager commands inside a sandbox directory and captures their output

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Options applied to every command that installs packages
pub const INSTALL_OPTIONS: [&str; 3] = [
    "--prefer-offline",
    "--config.lockfile=false",
    "--config.auto-install-peers=true",
];

pub const DEFAULT_LAUNCHER: &str = "npx";

/// Package name to exact version
pub type Dependencies = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, InstallError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Tools installed into the project and run through the package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTool {
    Tsc,
}

impl LocalTool {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tsc => "tsc",
        }
    }
}

#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    /// Add exact package versions; an empty map does nothing
    async fn add_dependencies(&self, dir: &Path, dependencies: &Dependencies)
        -> Result<CommandOutput>;

    async fn init_project(&self, dir: &Path) -> Result<CommandOutput>;

    async fn run_local_tool(&self, dir: &Path, tool: LocalTool) -> Result<CommandOutput>;

    /// Link a local package directory into the project
    async fn link(&self, dir: &Path, dependency_dir: &Path) -> Result<CommandOutput>;

    async fn install(&self, dir: &Path) -> Result<CommandOutput>;
}

/// Runs `<launcher> pnpm <command> <args>` in the target directory
#[derive(Debug, Clone)]
pub struct PnpmInstaller {
    launcher: String,
}

impl Default for PnpmInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_LAUNCHER)
    }
}

impl PnpmInstaller {
    pub fn new(launcher: impl Into<String>) -> Self {
        Self {
            launcher: launcher.into(),
        }
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    async fn execute(&self, dir: &Path, command: &str, args: &[String]) -> Result<CommandOutput> {
        let full_command = format!("{} pnpm {} {}", self.launcher, command, args.join(" "))
            .trim_end()
            .to_string();
        info!(
            "Running package manager in {}: {}",
            dir.display(),
            full_command
        );

        let output = Command::new(&self.launcher)
            .arg("pnpm")
            .arg(command)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| InstallError::Spawn {
                command: full_command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(InstallError::CommandFailed {
                command: full_command,
                code: output.status.code(),
                stderr,
            });
        }

        debug!("`{}` finished", full_command);
        Ok(CommandOutput { stdout, stderr })
    }
}

fn install_options() -> impl Iterator<Item = String> {
    INSTALL_OPTIONS.iter().map(|option| option.to_string())
}

#[async_trait]
impl DependencyInstaller for PnpmInstaller {
    async fn add_dependencies(
        &self,
        dir: &Path,
        dependencies: &Dependencies,
    ) -> Result<CommandOutput> {
        if dependencies.is_empty() {
            info!("Skipping dependency install, no dependencies to add");
            return Ok(CommandOutput::default());
        }

        let args: Vec<String> = dependencies
            .iter()
            .map(|(name, version)| format!("{}@{}", name, version))
            .chain(install_options())
            .collect();

        self.execute(dir, "add", &args).await
    }

    async fn init_project(&self, dir: &Path) -> Result<CommandOutput> {
        self.execute(dir, "init", &[]).await
    }

    async fn run_local_tool(&self, dir: &Path, tool: LocalTool) -> Result<CommandOutput> {
        self.execute(dir, tool.as_str(), &[]).await
    }

    async fn link(&self, dir: &Path, dependency_dir: &Path) -> Result<CommandOutput> {
        let output = self
            .execute(dir, "link", &[dependency_dir.display().to_string()])
            .await?;
        info!(
            "Linked {} into {}",
            dependency_dir.display(),
            dir.display()
        );
        Ok(output)
    }

    async fn install(&self, dir: &Path) -> Result<CommandOutput> {
        let args: Vec<String> = install_options().collect();
        self.execute(dir, "install", &args).await
    }
}
