// ABOUTME: Direct reads of the .git metadata store for branch and remote references

pub mod reconcile;

pub use reconcile::{display_branches, merge_sources, strip_remote_marker};

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tracing::debug;

/// Branch references derived fresh from the metadata store on every call.
/// Never cached: external commands mutate the underlying files at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub current_branch: Option<String>,
    pub local_branches: Vec<String>,
    pub remotes: BTreeMap<String, Vec<String>>,
}

/// Read HEAD, local branch refs and remote-tracking refs for one repository
/// without invoking git. Missing-path cases are normal states (no HEAD, no
/// remotes yet); every other read failure propagates so stale information is
/// never reported.
pub fn read_refs(repo_path: &Path) -> io::Result<ReferenceSet> {
    let git_dir = repo_path.join(".git");

    let current_branch = read_head(&git_dir)?;
    let local_branches = list_ref_files(&git_dir.join("refs/heads"))?;
    let remotes = read_remotes(&git_dir.join("refs/remotes"))?;

    debug!(
        "Read refs for {}: current={:?}, {} local, {} remotes",
        repo_path.display(),
        current_branch,
        local_branches.len(),
        remotes.len()
    );

    Ok(ReferenceSet {
        current_branch,
        local_branches,
        remotes,
    })
}

/// The symbolic HEAD pointer is a single line of the form
/// `ref: refs/heads/<name>\n`; the branch name is the segment after the last
/// slash. A missing pointer file means no current branch, not an error.
fn read_head(git_dir: &Path) -> io::Result<Option<String>> {
    let head_path = git_dir.join("HEAD");
    let content = match std::fs::read_to_string(&head_path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let line = content.lines().next().unwrap_or("");
    let name = line.rsplit('/').next().unwrap_or(line).trim_end();
    if name.is_empty() {
        Ok(None)
    } else {
        Ok(Some(name.to_string()))
    }
}

/// Non-recursive listing of a ref directory: one file per branch, filename is
/// the branch name. A missing directory yields an empty list.
fn list_ref_files(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Each subdirectory under refs/remotes is a remote name; the files beneath
/// it are that remote's branches, excluding the remote's own HEAD pointer.
/// No remotes directory is the normal state for a repository with no remote.
fn read_remotes(remotes_dir: &Path) -> io::Result<BTreeMap<String, Vec<String>>> {
    let entries = match std::fs::read_dir(remotes_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err),
    };

    let mut remotes = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(remote_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let mut branches = list_ref_files(&entry.path())?;
        branches.retain(|name| name != "HEAD");
        remotes.insert(remote_name, branches);
    }
    Ok(remotes)
}
