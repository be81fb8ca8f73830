// ABOUTME: Library crate for GitHUD exposing the sync-state dashboard core

pub mod config;
pub mod ops;
pub mod probe;
pub mod refs;
pub mod runner;
pub mod scanner;
pub mod scheduler;
pub mod tree;
