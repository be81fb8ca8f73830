// ABOUTME: Mutating git operations (checkout, commit, push, pull, merge, branch, ignore)

use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::probe::changes;
use crate::refs;
use crate::runner::{CommandOutput, CommandRunner};

#[derive(Error, Debug)]
pub enum OperationError {
    #[error("command `git {command}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("a commit message is needed")]
    EmptyCommitMessage,
    #[error("working tree has uncommitted changes; commit or discard them before pulling")]
    WorkingTreeDirty,
    #[error("branch already exists: {0}")]
    BranchExists(String),
    #[error("no branch is currently checked out")]
    NoCurrentBranch,
    #[error("file does not exist: {0}")]
    FileMissing(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Success report for one mutating operation: a short human message plus the
/// captured command output as detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub message: String,
    pub detail: String,
}

impl OperationOutcome {
    fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

/// Mutating command surface for one repository. Every git call goes through
/// the external runner; a non-zero exit is reported with the command, exit
/// status and captured diagnostics, and the repository state is not assumed
/// to have changed.
pub struct Operations<'a> {
    runner: &'a dyn CommandRunner,
    repo_path: &'a Path,
    repo_name: &'a str,
}

impl<'a> Operations<'a> {
    pub fn new(runner: &'a dyn CommandRunner, repo_path: &'a Path, repo_name: &'a str) -> Self {
        Self {
            runner,
            repo_path,
            repo_name,
        }
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput, OperationError> {
        let output = self.runner.run(self.repo_path, args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(OperationError::CommandFailed {
                command: args.join(" "),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    fn current_branch(&self) -> Result<String, OperationError> {
        refs::read_refs(self.repo_path)?
            .current_branch
            .ok_or(OperationError::NoCurrentBranch)
    }

    /// Switch to `branch`. A safety commit of anything staged runs first so
    /// the checkout cannot clobber in-flight work; its failure (usually
    /// "nothing to commit") is ignored. No-op when already on the branch.
    pub fn checkout(&self, branch: &str) -> Result<OperationOutcome, OperationError> {
        let current = refs::read_refs(self.repo_path)?.current_branch;
        if current.as_deref() == Some(branch) {
            return Ok(OperationOutcome::new(
                format!("already on {branch}"),
                String::new(),
            ));
        }

        if let Err(err) = self.git(&["commit", "-m", "change_branch"]) {
            debug!("Pre-checkout commit skipped: {err}");
        }
        let output = self.git(&["checkout", branch])?;
        info!("{}: checked out {branch}", self.repo_name);
        Ok(OperationOutcome::new(
            format!("checked out {branch}"),
            output.stdout,
        ))
    }

    /// The branch-change sequence: an existing local branch is checked out
    /// directly; a remote-only name is created locally, checked out, then
    /// pulled to populate it.
    pub fn switch_branch(&self, branch: &str) -> Result<OperationOutcome, OperationError> {
        let reference_set = refs::read_refs(self.repo_path)?;
        if reference_set.local_branches.iter().any(|b| b == branch) {
            return self.checkout(branch);
        }

        self.git(&["branch", branch])?;
        self.checkout(branch)?;
        self.pull()?;
        Ok(OperationOutcome::new(
            format!("created and checked out {branch}"),
            String::new(),
        ))
    }

    pub fn stage(&self, file: &str) -> Result<OperationOutcome, OperationError> {
        let output = self.git(&["add", file])?;
        Ok(OperationOutcome::new(format!("added {file}"), output.stdout))
    }

    /// Stage the given files, then commit. An empty message is rejected
    /// before any command runs.
    pub fn commit(
        &self,
        message: &str,
        files: &[String],
    ) -> Result<OperationOutcome, OperationError> {
        if message.trim().is_empty() {
            return Err(OperationError::EmptyCommitMessage);
        }
        for file in files {
            self.stage(file)?;
        }
        let output = self.git(&["commit", "-m", message])?;
        info!("{}: committed {} files", self.repo_name, files.len());
        Ok(OperationOutcome::new("commit done", output.stdout))
    }

    pub fn commit_and_push(
        &self,
        message: &str,
        files: &[String],
    ) -> Result<OperationOutcome, OperationError> {
        self.commit(message, files)?;
        self.push()
    }

    /// Pull the current branch from origin. Refused while the filtered
    /// change list is non-empty: local edits must be committed or discarded
    /// first.
    pub fn pull(&self) -> Result<OperationOutcome, OperationError> {
        let branch = self.current_branch()?;
        let pending = changes::list_changes(self.runner, self.repo_path, self.repo_name)?;
        if !pending.is_empty() {
            warn!(
                "{}: refusing pull with {} uncommitted changes",
                self.repo_name,
                pending.len()
            );
            return Err(OperationError::WorkingTreeDirty);
        }

        let output = self.git(&["pull", "origin", &branch])?;
        Ok(OperationOutcome::new(
            format!("{branch} is up to date"),
            output.stdout,
        ))
    }

    pub fn push(&self) -> Result<OperationOutcome, OperationError> {
        let branch = self.current_branch()?;
        let output = self.git(&["push", "origin", &branch])?;
        Ok(OperationOutcome::new("push done", output.stdout))
    }

    pub fn merge(&self, from: &str) -> Result<OperationOutcome, OperationError> {
        let output = self.git(&["merge", from])?;
        Ok(OperationOutcome::new(
            format!("merged {from}"),
            output.stdout,
        ))
    }

    pub fn create_branch(&self, name: &str) -> Result<OperationOutcome, OperationError> {
        let reference_set = refs::read_refs(self.repo_path)?;
        if reference_set.local_branches.iter().any(|b| b == name) {
            return Err(OperationError::BranchExists(name.to_string()));
        }
        let output = self.git(&["branch", name])?;
        Ok(OperationOutcome::new(
            format!("branch {name} created"),
            output.stdout,
        ))
    }

    pub fn delete_branch(&self, name: &str) -> Result<OperationOutcome, OperationError> {
        let output = self.git(&["branch", "-d", name])?;
        Ok(OperationOutcome::new(
            format!("branch {name} deleted"),
            output.stdout,
        ))
    }

    /// Append the given files to the repository's ignore list. Plain
    /// filesystem append, no git command involved; each file must exist.
    pub fn ignore(&self, files: &[String]) -> Result<OperationOutcome, OperationError> {
        for file in files {
            if !self.repo_path.join(file).exists() {
                return Err(OperationError::FileMissing(file.clone()));
            }
        }

        let gitignore = self.repo_path.join(".gitignore");
        let mut handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore)?;
        for file in files {
            writeln!(handle, "{file}")?;
        }
        Ok(OperationOutcome::new(
            format!("{} entries ignored", files.len()),
            String::new(),
        ))
    }
}
