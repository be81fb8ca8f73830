// ABOUTME: Hierarchical project/repository tree built from discovery records

pub mod node;
pub mod project_tree;

pub use node::{NodeKind, StatusFlags, StatusIndicator, TreeNode};
pub use project_tree::ProjectTree;
