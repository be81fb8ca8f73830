// ABOUTME: Integration tests for discovery scan, project grouping and tree construction

use std::path::{Path, PathBuf};

use githud::config::ScanConfig;
use githud::scanner::{self, DiscoveryRecord};
use githud::tree::{ProjectTree, TreeNode};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn make_working_tree(base: &Path, rel: &str) -> PathBuf {
    let dir = base.join(rel);
    std::fs::create_dir_all(dir.join(".git")).unwrap();
    dir
}

fn segs(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_scan_then_group_yields_one_project_with_two_repos() {
    let home = TempDir::new().unwrap();
    let root = home.path().join("Git");
    std::fs::create_dir_all(&root).unwrap();
    let a = make_working_tree(&root, "proj/a");
    let b = make_working_tree(&root, "proj/b");

    let config = ScanConfig::new(vec![root.clone()]);
    let records = scanner::scan(&config).unwrap();
    assert_eq!(records.len(), 2);

    let projects = scanner::group_by_project(records);
    assert_eq!(projects.len(), 1);
    let repos: Vec<(&str, &Path)> = projects["proj"]
        .iter()
        .map(|r| (r.repo_name.as_str(), r.absolute_path.as_path()))
        .collect();
    assert_eq!(repos, vec![("a", a.as_path()), ("b", b.as_path())]);
}

#[test]
fn test_tree_contains_one_leaf_per_record_for_any_input_order() {
    let home = TempDir::new().unwrap();
    let root = home.path().join("Git");
    std::fs::create_dir_all(&root).unwrap();
    make_working_tree(&root, "proj/a");
    make_working_tree(&root, "proj/b");
    make_working_tree(&root, "solo");

    let config = ScanConfig::new(vec![root]);
    let mut records = scanner::scan(&config).unwrap();

    let forward = ProjectTree::build(&records, home.path());
    records.reverse();
    let reversed = ProjectTree::build(&records, home.path());
    assert_eq!(forward, reversed);

    // Every record is reachable as a repository leaf by its relative path.
    for record in &records {
        let rel: Vec<String> = record
            .absolute_path
            .strip_prefix(home.path())
            .unwrap()
            .iter()
            .map(|s| s.to_str().unwrap().to_string())
            .collect();
        let node = forward.find(&rel).expect("leaf must exist");
        assert!(node.is_repository(), "{:?} should be a repository", rel);
    }
    assert_eq!(forward.repositories().len(), 3);
}

#[test]
fn test_folders_are_plain_nodes_and_siblings_stay_unique() {
    let record = |path: &str, name: &str| DiscoveryRecord {
        project_key: "Git/proj".to_string(),
        repo_name: name.to_string(),
        absolute_path: PathBuf::from(path),
    };
    let tree = ProjectTree::build(
        &[
            record("/home/u/Git/proj/a", "a"),
            record("/home/u/Git/proj/b", "b"),
        ],
        Path::new("/home/u"),
    );

    let proj = tree.find(&segs(&["Git", "proj"])).unwrap();
    assert!(!proj.is_repository());
    let names: Vec<&str> = proj.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(proj
        .children
        .iter()
        .all(TreeNode::is_repository));
}

#[test]
fn test_missing_root_fails_before_any_scanning() {
    let home = TempDir::new().unwrap();
    let config = ScanConfig::new(vec![home.path().join("does-not-exist")]);
    assert!(scanner::scan(&config).is_err());
}
