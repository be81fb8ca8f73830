// ABOUTME: ProjectTree with idempotent path insertion, repository marking and BFS enumeration

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::scanner::DiscoveryRecord;
use crate::tree::node::{NodeKind, StatusFlags, TreeNode};

/// Single rooted tree of folders and repository leaves. Built once per
/// session from a full scan and mutated in place afterwards: structure by the
/// build step, status fields by the sweep worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    root: TreeNode,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    pub fn new() -> Self {
        Self {
            root: TreeNode::folder(""),
        }
    }

    /// Build a tree from discovery records. Each record's path is taken
    /// relative to `base` (typically the user's home directory); records
    /// outside `base` keep their full path. Records are inserted shallowest
    /// first so a working tree nested inside another one is rejected before
    /// it could give a repository node repository children.
    pub fn build(records: &[DiscoveryRecord], base: &Path) -> Self {
        let mut tree = Self::new();

        let mut ordered: Vec<&DiscoveryRecord> = records.iter().collect();
        ordered.sort_by_key(|record| {
            (
                record.absolute_path.components().count(),
                record.absolute_path.clone(),
            )
        });

        for record in ordered {
            let segments = relative_segments(&record.absolute_path, base);
            if segments.is_empty() {
                warn!("Skipping record with empty path: {:?}", record);
                continue;
            }
            if tree.path_crosses_repository(&segments) {
                warn!(
                    "Skipping nested working tree under another repository: {}",
                    record.absolute_path.display()
                );
                continue;
            }
            tree.mark_repository(&segments, record.absolute_path.clone());
        }

        debug!("Built project tree with {} repositories", tree.repositories().len());
        tree
    }

    /// Walk/create nodes along the given relative path, creating missing
    /// intermediates as plain folders, and return the terminal node. Calling
    /// this twice with the same path returns the same node; sibling names are
    /// never duplicated. Children stay sorted by name.
    pub fn get_or_create(&mut self, segments: &[String]) -> &mut TreeNode {
        let mut node = &mut self.root;
        for segment in segments {
            let idx = match node
                .children
                .binary_search_by(|child| child.name.as_str().cmp(segment.as_str()))
            {
                Ok(idx) => idx,
                Err(idx) => {
                    node.children.insert(idx, TreeNode::folder(segment.clone()));
                    idx
                }
            };
            node = &mut node.children[idx];
        }
        node
    }

    /// Convert the terminal node of `segments` into a repository leaf.
    pub fn mark_repository(&mut self, segments: &[String], absolute_path: PathBuf) {
        let node = self.get_or_create(segments);
        node.kind = NodeKind::Repository {
            absolute_path,
            status: StatusFlags::default(),
            status_checked: false,
        };
    }

    pub fn find(&self, segments: &[String]) -> Option<&TreeNode> {
        let mut node = &self.root;
        for segment in segments {
            node = node
                .children
                .binary_search_by(|child| child.name.as_str().cmp(segment.as_str()))
                .ok()
                .map(|idx| &node.children[idx])?;
        }
        Some(node)
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// True when any node strictly above the terminal segment is already a
    /// repository leaf.
    fn path_crosses_repository(&self, segments: &[String]) -> bool {
        let mut node = &self.root;
        for segment in &segments[..segments.len().saturating_sub(1)] {
            match node
                .children
                .binary_search_by(|child| child.name.as_str().cmp(segment.as_str()))
            {
                Ok(idx) => {
                    node = &node.children[idx];
                    if node.is_repository() {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
        false
    }

    /// Deterministic breadth-first enumeration of every node, used by bulk
    /// operations such as the status sweep.
    pub fn walk_bfs(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut queue: VecDeque<&TreeNode> = VecDeque::new();
        queue.push_back(&self.root);
        while let Some(node) = queue.pop_front() {
            out.push(node);
            for child in &node.children {
                queue.push_back(child);
            }
        }
        out
    }

    /// Every repository leaf as (path segments from the root, absolute path),
    /// in BFS order.
    pub fn repositories(&self) -> Vec<(Vec<String>, PathBuf)> {
        let mut out = Vec::new();
        let mut queue: VecDeque<(Vec<String>, &TreeNode)> = VecDeque::new();
        queue.push_back((Vec::new(), &self.root));
        while let Some((prefix, node)) = queue.pop_front() {
            if let NodeKind::Repository { absolute_path, .. } = &node.kind {
                out.push((prefix.clone(), absolute_path.clone()));
            }
            for child in &node.children {
                let mut path = prefix.clone();
                path.push(child.name.clone());
                queue.push_back((path, child));
            }
        }
        out
    }

    pub fn find_repo_mut(&mut self, abs: &Path) -> Option<&mut TreeNode> {
        find_repo_in(&mut self.root, abs)
    }

    /// Mark every repository leaf as having an outstanding status check and
    /// return their absolute paths in BFS order.
    pub fn set_unchecked_all(&mut self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut queue: VecDeque<&mut TreeNode> = VecDeque::new();
        queue.push_back(&mut self.root);
        while let Some(node) = queue.pop_front() {
            if let NodeKind::Repository {
                absolute_path,
                status_checked,
                ..
            } = &mut node.kind
            {
                *status_checked = false;
                paths.push(absolute_path.clone());
            }
            for child in &mut node.children {
                queue.push_back(child);
            }
        }
        paths
    }

    /// Field-level status update for one repository; returns false when no
    /// leaf carries that path.
    pub fn apply_status(&mut self, abs: &Path, flags: StatusFlags) -> bool {
        match self.find_repo_mut(abs) {
            Some(node) => {
                if let NodeKind::Repository {
                    status,
                    status_checked,
                    ..
                } = &mut node.kind
                {
                    *status = flags;
                    *status_checked = true;
                }
                true
            }
            None => false,
        }
    }
}

fn find_repo_in<'a>(node: &'a mut TreeNode, abs: &Path) -> Option<&'a mut TreeNode> {
    if let NodeKind::Repository { absolute_path, .. } = &node.kind {
        if absolute_path == abs {
            return Some(node);
        }
    }
    for child in &mut node.children {
        if let Some(found) = find_repo_in(child, abs) {
            return Some(found);
        }
    }
    None
}

fn relative_segments(path: &Path, base: &Path) -> Vec<String> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .filter_map(|component| match component {
            std::path::Component::Normal(segment) => segment.to_str().map(str::to_string),
            _ => None,
        })
        .collect()
}
