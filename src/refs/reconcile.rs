// ABOUTME: Merges current, local and remote branch names into one ordered display list

use crate::refs::ReferenceSet;

/// Remote-only entries are wrapped in angle brackets so they stay visually
/// distinct from local branches without losing the underlying name.
fn wrap_remote(name: &str) -> String {
    format!("<{name}>")
}

/// Recover the remote branch name from a marked display entry, or None when
/// the entry is a plain local name.
pub fn strip_remote_marker(entry: &str) -> Option<&str> {
    entry.strip_prefix('<')?.strip_suffix('>')
}

/// Branch-selection surface: current branch first when present, then local
/// branches in reader order, then remote-only names (remote name discarded)
/// wrapped with the marker. First occurrence wins, case-sensitively.
pub fn display_branches(refs: &ReferenceSet) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    if let Some(current) = &refs.current_branch {
        out.push(current.clone());
    }
    for branch in &refs.local_branches {
        if !out.contains(branch) {
            out.push(branch.clone());
        }
    }
    for branches in refs.remotes.values() {
        for branch in branches {
            if refs.current_branch.as_deref() == Some(branch.as_str())
                || refs.local_branches.contains(branch)
            {
                continue;
            }
            let wrapped = wrap_remote(branch);
            if !out.contains(&wrapped) {
                out.push(wrapped);
            }
        }
    }

    out
}

/// Merge-source surface: the display list without the current branch.
pub fn merge_sources(refs: &ReferenceSet) -> Vec<String> {
    display_branches(refs)
        .into_iter()
        .filter(|entry| refs.current_branch.as_deref() != Some(entry.as_str()))
        .collect()
}
