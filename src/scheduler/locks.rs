// ABOUTME: Per-repository and per-operation-class mutual exclusion with scoped release

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// What the guard protects: one repository path, or the scheduler itself
/// (the full-sweep guard).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockScope {
    Repository(PathBuf),
    Scheduler,
}

/// Mutation covers every mutating command sequence (pull in progress, branch
/// change in progress, the no-two-mutations-per-repository rule). Refresh
/// covers status probes: per repository for targeted refreshes, scheduler
/// scoped for the full sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockClass {
    Mutation,
    Refresh,
}

type HeldSet = Arc<Mutex<HashSet<(LockScope, LockClass)>>>;

/// Try-acquire flag registry. Acquisition while a matching guard is held
/// yields None, which callers treat as a silent no-op (debouncing, not a
/// fault). Release is scoped: dropping the permit frees the guard on every
/// exit path.
#[derive(Debug, Clone, Default)]
pub struct OperationLock {
    held: HeldSet,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, scope: LockScope, class: LockClass) -> Option<LockPermit> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.insert((scope.clone(), class)) {
            Some(LockPermit {
                key: (scope, class),
                held: Arc::clone(&self.held),
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, scope: &LockScope, class: LockClass) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(scope.clone(), class))
    }
}

#[derive(Debug)]
pub struct LockPermit {
    key: (LockScope, LockClass),
    held: HeldSet,
}

impl Drop for LockPermit {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
