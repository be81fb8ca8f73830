// ABOUTME: Tree node variants and the per-repository status flags they carry

use std::path::PathBuf;

use serde::Serialize;

/// The three independent sync dimensions plus the probe-error signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub needs_pull: bool,
    pub needs_push: bool,
    pub needs_commit: bool,
    pub error: bool,
}

/// Single indicator shown for a repository. When several flags are true the
/// viewer sees exactly one, in this order: unchecked, error, pull, push,
/// commit, clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusIndicator {
    Unchecked,
    Error,
    NeedsPull,
    NeedsPush,
    NeedsCommit,
    Clean,
}

impl StatusIndicator {
    pub fn from_flags(flags: StatusFlags, checked: bool) -> Self {
        if !checked {
            StatusIndicator::Unchecked
        } else if flags.error {
            StatusIndicator::Error
        } else if flags.needs_pull {
            StatusIndicator::NeedsPull
        } else if flags.needs_push {
            StatusIndicator::NeedsPush
        } else if flags.needs_commit {
            StatusIndicator::NeedsCommit
        } else {
            StatusIndicator::Clean
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StatusIndicator::Unchecked => "…",
            StatusIndicator::Error => "✗",
            StatusIndicator::NeedsPull => "⇣",
            StatusIndicator::NeedsPush => "⇡",
            StatusIndicator::NeedsCommit => "±",
            StatusIndicator::Clean => "✓",
        }
    }
}

/// Folder or working tree; only the repository variant carries a path and
/// status, so nothing downstream has to branch on an is_repository flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Repository {
        absolute_path: PathBuf,
        status: StatusFlags,
        status_checked: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            children: Vec::new(),
        }
    }

    pub fn is_repository(&self) -> bool {
        matches!(self.kind, NodeKind::Repository { .. })
    }

    pub fn indicator(&self) -> Option<StatusIndicator> {
        match &self.kind {
            NodeKind::Folder => None,
            NodeKind::Repository {
                status,
                status_checked,
                ..
            } => Some(StatusIndicator::from_flags(*status, *status_checked)),
        }
    }
}
