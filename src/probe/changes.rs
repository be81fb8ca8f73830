// ABOUTME: Working-tree change enumeration with the transient-artifact suppression filter

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use crate::runner::CommandRunner;

/// Repositories with this display name additionally hide their own ignore
/// list; the dashboard keeps rewriting it and the churn is pure noise.
pub const RESERVED_PROJECT_NAME: &str = "githud";

/// Tool/IDE metadata directories never worth committing attention to.
const SUPPRESSED_DIRS: &[&str] = &[".idea", ".vscode", "__pycache__"];

/// Files the tool itself generates next to the working tree.
const GENERATED_FILES: &[&str] = &["githud.desktop", "user.conf"];

/// Modified, deleted and untracked-but-not-ignored files, filtered and
/// de-duplicated. Shared by the needs-commit probe and the interactive
/// change list.
pub fn list_changes(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    repo_name: &str,
) -> io::Result<BTreeSet<String>> {
    let output = runner.run(
        repo_path,
        &["ls-files", "-m", "-d", "-o", "--exclude-standard"],
    )?;
    Ok(filter_changes(output.stdout.lines(), repo_name))
}

/// Staged-but-uncommitted files, same filtering.
pub fn list_staged(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    repo_name: &str,
) -> io::Result<BTreeSet<String>> {
    let output = runner.run(repo_path, &["diff", "--name-only", "--cached"])?;
    Ok(filter_changes(output.stdout.lines(), repo_name))
}

fn filter_changes<'a>(
    lines: impl Iterator<Item = &'a str>,
    repo_name: &str,
) -> BTreeSet<String> {
    lines
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter(|entry| !is_suppressed(entry, repo_name))
        .map(str::to_string)
        .collect()
}

/// Deliberate noise filter: transient lock/backup artifacts, the tool's own
/// generated files, IDE metadata directories, and the reserved project's
/// ignore list are hidden from the user instead of shown as raw git output.
pub fn is_suppressed(entry: &str, repo_name: &str) -> bool {
    let segments: Vec<&str> = entry.split('/').collect();
    let Some(last) = segments.last() else {
        return false;
    };

    if last.starts_with(".~lock.") && last.ends_with('#') {
        return true;
    }
    if last.ends_with(".bak") {
        return true;
    }
    if GENERATED_FILES.contains(last) {
        return true;
    }
    if segments
        .iter()
        .any(|segment| SUPPRESSED_DIRS.contains(segment))
    {
        return true;
    }
    if repo_name == RESERVED_PROJECT_NAME && entry == ".gitignore" {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testutil::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_lock_and_backup_artifacts_are_suppressed() {
        let runner = ScriptedRunner::new();
        runner.script_ok(
            "ls-files -m -d -o --exclude-standard",
            ".~lock.report.odt#\nbuild.bak\nsrc/main.rs\n",
        );

        let changes =
            list_changes(&runner, &PathBuf::from("/tmp/repo"), "repo").unwrap();
        let entries: Vec<&str> = changes.iter().map(String::as_str).collect();
        assert_eq!(entries, vec!["src/main.rs"]);
    }

    #[test]
    fn test_ide_metadata_segments_are_suppressed() {
        assert!(is_suppressed(".idea/workspace.xml", "repo"));
        assert!(is_suppressed("src/__pycache__/mod.pyc", "repo"));
        assert!(is_suppressed(".vscode/settings.json", "repo"));
        assert!(!is_suppressed("src/idea.rs", "repo"));
    }

    #[test]
    fn test_generated_tool_files_are_suppressed() {
        assert!(is_suppressed("githud.desktop", "repo"));
        assert!(is_suppressed("user.conf", "repo"));
    }

    #[test]
    fn test_ignore_list_hidden_only_in_reserved_project() {
        assert!(is_suppressed(".gitignore", RESERVED_PROJECT_NAME));
        assert!(!is_suppressed(".gitignore", "other-repo"));
    }

    #[test]
    fn test_result_set_is_deduplicated() {
        let runner = ScriptedRunner::new();
        runner.script_ok(
            "ls-files -m -d -o --exclude-standard",
            "a.txt\nb.txt\na.txt\n",
        );

        let changes =
            list_changes(&runner, &PathBuf::from("/tmp/repo"), "repo").unwrap();
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_staged_listing_uses_cached_diff() {
        let runner = ScriptedRunner::new();
        runner.script_ok("diff --name-only --cached", "staged.rs\n");

        let staged =
            list_staged(&runner, &PathBuf::from("/tmp/repo"), "repo").unwrap();
        assert!(staged.contains("staged.rs"));
        assert_eq!(runner.calls(), vec!["diff --name-only --cached"]);
    }
}
