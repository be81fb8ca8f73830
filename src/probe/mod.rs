// ABOUTME: Status probe computing the needs-pull / needs-push / needs-commit flags for one repository

pub mod changes;

use std::io;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::refs;
use crate::runner::CommandRunner;
use crate::tree::StatusFlags;

lazy_static! {
    /// Fetch diagnostic line, e.g.
    /// ` = [up to date]      main       -> origin/main`
    /// `   abc1234..def5678  main       -> origin/main`
    /// ` * [new branch]      feature    -> origin/feature`
    static ref FETCH_DIAG: Regex = Regex::new(
        r"^\s*([0-9a-f]+\.{2,3}[0-9a-f]+|[=+\-*!t])\s+(?:\[[^\]]*\]\s+)?\S+\s+->\s+(\S+)"
    )
    .expect("fetch diagnostic regex");
}

/// Compute the three independent status dimensions for one repository.
/// Side-effect-free on repository state; the only network touch is the
/// dry-run fetch. I/O failures reading metadata propagate to the caller.
pub fn probe(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    repo_name: &str,
) -> io::Result<StatusFlags> {
    let reference_set = refs::read_refs(repo_path)?;
    let mut flags = StatusFlags::default();

    match &reference_set.current_branch {
        Some(branch) => {
            check_needs_pull(runner, repo_path, branch, &mut flags)?;
            check_needs_push(repo_path, branch, &mut flags)?;
        }
        None => {
            // Detached or unborn HEAD: sync state against the remote cannot
            // be assessed, which is an error signal rather than "clean".
            warn!(
                "No current branch in {}; marking status as error",
                repo_path.display()
            );
            flags.error = true;
        }
    }

    flags.needs_commit = needs_commit(runner, repo_path, repo_name)?;
    Ok(flags)
}

/// Dry-run fetch, parsed line by line. A diagnostic line for the tracked
/// remote branch with any marker other than `=` (up to date) means a pull is
/// needed. No parseable diagnostic output at all (unreachable network, no
/// remote) is an error state, deliberately distinct from "no pull needed".
fn check_needs_pull(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    branch: &str,
    flags: &mut StatusFlags,
) -> io::Result<()> {
    let output = runner.run(repo_path, &["fetch", "-v", "--dry-run", "origin"])?;
    let tracked = format!("origin/{branch}");

    let mut saw_diagnostic = false;
    for line in output.stderr.lines().chain(output.stdout.lines()) {
        let Some(captures) = FETCH_DIAG.captures(line) else {
            continue;
        };
        saw_diagnostic = true;

        let marker = &captures[1];
        let target = &captures[2];
        if target == tracked && marker != "=" {
            debug!("Pull needed in {}: {}", repo_path.display(), line.trim());
            flags.needs_pull = true;
        }
    }

    if !saw_diagnostic {
        debug!(
            "No fetch diagnostics for {} (exit {}); marking error",
            repo_path.display(),
            output.exit_code
        );
        flags.error = true;
    }
    Ok(())
}

/// Byte-compare the local branch tip against its remote-tracking counterpart.
/// A repository may legitimately have no tracking ref yet, so when either
/// file is absent the check is skipped and the flag keeps its default.
fn check_needs_push(repo_path: &Path, branch: &str, flags: &mut StatusFlags) -> io::Result<()> {
    let local = repo_path.join(".git/refs/heads").join(branch);
    let remote = repo_path.join(".git/refs/remotes/origin").join(branch);

    let (Some(local_tip), Some(remote_tip)) =
        (read_ref_bytes(&local)?, read_ref_bytes(&remote)?)
    else {
        return Ok(());
    };

    flags.needs_push = local_tip != remote_tip;
    Ok(())
}

fn read_ref_bytes(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// True when either the filtered working-tree change list or the filtered
/// staged list has at least one entry.
fn needs_commit(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    repo_name: &str,
) -> io::Result<bool> {
    let working = changes::list_changes(runner, repo_path, repo_name)?;
    if !working.is_empty() {
        return Ok(true);
    }
    let staged = changes::list_staged(runner, repo_path, repo_name)?;
    Ok(!staged.is_empty())
}
