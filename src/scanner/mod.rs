// ABOUTME: Filesystem scanner that discovers git working trees under the configured roots

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{ConfigError, ScanConfig};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// One working tree found under a configured root.
///
/// `project_key` is the working tree's parent path relative to the root it
/// was found under, used to cluster sibling working trees into one project.
/// It is empty for a working tree sitting directly in a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryRecord {
    pub project_key: String,
    pub repo_name: String,
    pub absolute_path: PathBuf,
}

/// Walk every configured root and return one record per working tree found.
///
/// A directory is a working tree iff it contains a `.git` entry. The walk
/// does not descend into `.git` directories themselves but keeps going below
/// a working tree, so nested working trees are discovered too.
pub fn scan(config: &ScanConfig) -> Result<Vec<DiscoveryRecord>, ScanError> {
    config.validate()?;

    let mut records = Vec::new();
    for root in &config.roots {
        scan_root(root, &mut records)?;
    }

    info!(
        "Discovered {} working trees under {} roots",
        records.len(),
        config.roots.len()
    );
    Ok(records)
}

fn scan_root(root: &Path, records: &mut Vec<DiscoveryRecord>) -> Result<(), ScanError> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name().to_str() != Some(".git"));

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        if !dir.join(".git").exists() {
            continue;
        }

        let repo_name = match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let project_key = dir
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(path_to_key)
            .unwrap_or_default();

        debug!("Found working tree {:?} (project {:?})", dir, project_key);
        records.push(DiscoveryRecord {
            project_key,
            repo_name,
            absolute_path: dir.to_path_buf(),
        });
    }

    Ok(())
}

/// Internal platform-neutral key: path segments joined with `/` regardless of
/// the host separator.
fn path_to_key(path: &Path) -> String {
    path.iter()
        .filter_map(|segment| segment.to_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Cluster records by `project_key`. The grouping is order-independent:
/// records are sorted into a BTreeMap keyed by project, so any input order
/// yields the same final grouping.
pub fn group_by_project(records: Vec<DiscoveryRecord>) -> BTreeMap<String, Vec<DiscoveryRecord>> {
    let mut projects: BTreeMap<String, Vec<DiscoveryRecord>> = BTreeMap::new();
    for record in records {
        projects.entry(record.project_key.clone()).or_default().push(record);
    }
    for group in projects.values_mut() {
        group.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
    }
    projects
}
