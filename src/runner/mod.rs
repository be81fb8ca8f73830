// ABOUTME: External command capability: synchronous git invocation with captured output

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The one external capability the core consumes: run a git command with the
/// working directory set to the repository path and capture its result.
/// Probes and mutating operations go through this seam so tests can script
/// the tool's behavior.
pub trait CommandRunner: Send + Sync {
    fn run(&self, repo_path: &Path, args: &[&str]) -> io::Result<CommandOutput>;
}

/// Production runner shelling out to the git binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCommandRunner;

impl CommandRunner for GitCommandRunner {
    fn run(&self, repo_path: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        debug!("Running git {:?} in {}", args, repo_path.display());
        let output = Command::new("git")
            .current_dir(repo_path)
            .args(args)
            .output()?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
