// ABOUTME: Background refresh scheduler driving status probes and mutating operations

pub mod locks;

pub use locks::{LockClass, LockPermit, LockScope, OperationLock};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::ops::{OperationError, OperationOutcome, Operations};
use crate::probe;
use crate::runner::CommandRunner;
use crate::tree::{NodeKind, ProjectTree, StatusFlags};

/// Incremental updates published to the presentation layer while sweeps and
/// operations run in the background.
#[derive(Debug)]
pub enum StatusEvent {
    SweepStarted,
    RepoUnchecked {
        path: PathBuf,
    },
    RepoStatus {
        path: PathBuf,
        flags: StatusFlags,
    },
    SweepFinished,
    OperationFinished {
        path: PathBuf,
        operation: &'static str,
        result: Result<OperationOutcome, OperationError>,
    },
}

/// A mutating request against one repository, executed off the interactive
/// path by a dedicated worker.
#[derive(Debug, Clone)]
pub enum RepoOperation {
    Checkout { branch: String },
    SwitchBranch { branch: String },
    Commit { message: String, files: Vec<String> },
    CommitAndPush { message: String, files: Vec<String> },
    Pull,
    Push,
    Merge { from: String },
    CreateBranch { name: String },
    DeleteBranch { name: String },
    Ignore { files: Vec<String> },
}

impl RepoOperation {
    pub fn label(&self) -> &'static str {
        match self {
            RepoOperation::Checkout { .. } => "checkout",
            RepoOperation::SwitchBranch { .. } => "switch-branch",
            RepoOperation::Commit { .. } => "commit",
            RepoOperation::CommitAndPush { .. } => "commit-and-push",
            RepoOperation::Pull => "pull",
            RepoOperation::Push => "push",
            RepoOperation::Merge { .. } => "merge",
            RepoOperation::CreateBranch { .. } => "create-branch",
            RepoOperation::DeleteBranch { .. } => "delete-branch",
            RepoOperation::Ignore { .. } => "ignore",
        }
    }
}

/// Drives StatusProbe over the whole tree without blocking callers, refreshes
/// single repositories after mutations, and serializes mutating operations
/// per repository through OperationLock.
pub struct RefreshScheduler {
    tree: Arc<RwLock<ProjectTree>>,
    runner: Arc<dyn CommandRunner>,
    locks: OperationLock,
    events: mpsc::UnboundedSender<StatusEvent>,
}

impl RefreshScheduler {
    pub fn new(
        tree: Arc<RwLock<ProjectTree>>,
        runner: Arc<dyn CommandRunner>,
        events: mpsc::UnboundedSender<StatusEvent>,
    ) -> Self {
        Self {
            tree,
            runner,
            locks: OperationLock::new(),
            events,
        }
    }

    pub fn tree(&self) -> Arc<RwLock<ProjectTree>> {
        Arc::clone(&self.tree)
    }

    /// Full sweep: mark every repository unchecked, then probe them in issue
    /// order, applying and publishing each result incrementally. A second
    /// sweep requested while one runs is a silent no-op (returns false).
    /// Repositories with a targeted refresh in flight are skipped so that the
    /// later-issued probe's result is never overwritten by this one.
    pub async fn refresh_all(&self) -> bool {
        let Some(_permit) = self
            .locks
            .try_acquire(LockScope::Scheduler, LockClass::Refresh)
        else {
            debug!("Full sweep already in progress; request ignored");
            return false;
        };

        let _ = self.events.send(StatusEvent::SweepStarted);
        let paths = self.tree.write().await.set_unchecked_all();
        for path in &paths {
            let _ = self
                .events
                .send(StatusEvent::RepoUnchecked { path: path.clone() });
        }

        for path in paths {
            // Holding the repository's refresh permit across the probe keeps
            // it mutually exclusive with targeted refreshes: results for one
            // repository always apply in probe-issue order.
            let Some(_repo_permit) = self
                .locks
                .try_acquire(LockScope::Repository(path.clone()), LockClass::Refresh)
            else {
                debug!(
                    "Skipping sweep probe for {}: targeted refresh in flight",
                    path.display()
                );
                continue;
            };
            self.probe_and_apply(path).await;
        }

        let _ = self.events.send(StatusEvent::SweepFinished);
        true
    }

    /// Targeted refresh of exactly one repository, leaving every other node
    /// untouched. A second request while one is outstanding for the same
    /// repository is a silent no-op.
    pub async fn refresh_repo(&self, path: &Path) -> bool {
        let Some(_permit) = self.locks.try_acquire(
            LockScope::Repository(path.to_path_buf()),
            LockClass::Refresh,
        ) else {
            debug!("Refresh already outstanding for {}", path.display());
            return false;
        };

        {
            let mut tree = self.tree.write().await;
            let Some(node) = tree.find_repo_mut(path) else {
                warn!("Refresh requested for unknown repository {}", path.display());
                return false;
            };
            if let NodeKind::Repository { status_checked, .. } = &mut node.kind {
                *status_checked = false;
            }
        }
        let _ = self.events.send(StatusEvent::RepoUnchecked {
            path: path.to_path_buf(),
        });

        self.probe_and_apply(path.to_path_buf()).await;
        true
    }

    /// Periodic resweep to catch externally-made changes. The first tick is
    /// consumed immediately so callers keep control of the initial sweep.
    pub fn spawn_periodic(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Periodic sweep triggered");
                scheduler.refresh_all().await;
            }
        })
    }

    /// Submit a mutating operation. The per-repository mutation guard is
    /// taken up front: if it is already held the request is dropped (UI
    /// debounce, returns false). The operation runs on a blocking worker,
    /// its result is published, the guard is released, and only then a
    /// targeted refresh reconciles the repository's status.
    pub fn submit(self: &Arc<Self>, path: &Path, operation: RepoOperation) -> bool {
        let Some(permit) = self.locks.try_acquire(
            LockScope::Repository(path.to_path_buf()),
            LockClass::Mutation,
        ) else {
            debug!(
                "Operation {} ignored: another mutation is in flight for {}",
                operation.label(),
                path.display()
            );
            return false;
        };

        let scheduler = Arc::clone(self);
        let path = path.to_path_buf();
        tokio::spawn(async move {
            let label = operation.label();
            let result = {
                let runner = Arc::clone(&scheduler.runner);
                let op_path = path.clone();
                tokio::task::spawn_blocking(move || {
                    run_operation(runner.as_ref(), &op_path, operation)
                })
                .await
            };
            let result = match result {
                Ok(result) => result,
                Err(join_err) => {
                    error!("Operation worker failed: {join_err}");
                    Err(OperationError::Io(io::Error::other(join_err.to_string())))
                }
            };

            if let Err(err) = &result {
                warn!("{label} failed for {}: {err}", path.display());
            }
            drop(permit);
            let _ = scheduler.events.send(StatusEvent::OperationFinished {
                path: path.clone(),
                operation: label,
                result,
            });

            // Reconcile only after the command's result has been received so
            // the probe observes post-mutation state.
            scheduler.refresh_repo(&path).await;
        });
        true
    }

    async fn probe_and_apply(&self, path: PathBuf) {
        let runner = Arc::clone(&self.runner);
        let probe_path = path.clone();
        let repo_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let result = tokio::task::spawn_blocking(move || {
            probe::probe(runner.as_ref(), &probe_path, &repo_name)
        })
        .await;

        let flags = match result {
            Ok(Ok(flags)) => flags,
            Ok(Err(err)) => {
                // A single repository's read failure must not abort the sweep.
                warn!("Probe failed for {}: {err}", path.display());
                StatusFlags {
                    error: true,
                    ..StatusFlags::default()
                }
            }
            Err(join_err) => {
                error!("Probe worker failed for {}: {join_err}", path.display());
                StatusFlags {
                    error: true,
                    ..StatusFlags::default()
                }
            }
        };

        self.tree.write().await.apply_status(&path, flags);
        let _ = self.events.send(StatusEvent::RepoStatus { path, flags });
    }
}

fn run_operation(
    runner: &dyn CommandRunner,
    path: &Path,
    operation: RepoOperation,
) -> Result<OperationOutcome, OperationError> {
    let repo_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let ops = Operations::new(runner, path, &repo_name);

    match operation {
        RepoOperation::Checkout { branch } => ops.checkout(&branch),
        RepoOperation::SwitchBranch { branch } => ops.switch_branch(&branch),
        RepoOperation::Commit { message, files } => ops.commit(&message, &files),
        RepoOperation::CommitAndPush { message, files } => ops.commit_and_push(&message, &files),
        RepoOperation::Pull => ops.pull(),
        RepoOperation::Push => ops.push(),
        RepoOperation::Merge { from } => ops.merge(&from),
        RepoOperation::CreateBranch { name } => ops.create_branch(&name),
        RepoOperation::DeleteBranch { name } => ops.delete_branch(&name),
        RepoOperation::Ignore { files } => ops.ignore(&files),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testutil::ScriptedRunner;
    use crate::scanner::DiscoveryRecord;
    use tempfile::TempDir;

    const FETCH: &str = "fetch -v --dry-run origin";
    const LS_FILES: &str = "ls-files -m -d -o --exclude-standard";
    const DIFF_CACHED: &str = "diff --name-only --cached";

    struct Fixture {
        _dir: TempDir,
        scheduler: Arc<RefreshScheduler>,
        events: mpsc::UnboundedReceiver<StatusEvent>,
        repo_path: PathBuf,
    }

    fn fixture(runner: ScriptedRunner) -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo_path = dir.path().join("proj/app");
        let git_dir = repo_path.join(".git");
        std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let record = DiscoveryRecord {
            project_key: "proj".to_string(),
            repo_name: "app".to_string(),
            absolute_path: repo_path.clone(),
        };
        let tree = Arc::new(RwLock::new(ProjectTree::build(&[record], dir.path())));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(RefreshScheduler::new(tree, Arc::new(runner), tx));

        Fixture {
            _dir: dir,
            scheduler,
            events: rx,
            repo_path,
        }
    }

    fn quiet_runner() -> ScriptedRunner {
        let runner = ScriptedRunner::new();
        runner.script_stderr(FETCH, " = [up to date]      main       -> origin/main\n");
        runner.script_ok(LS_FILES, "");
        runner.script_ok(DIFF_CACHED, "");
        runner
    }

    #[tokio::test]
    async fn test_full_sweep_publishes_incremental_events() {
        let mut fx = fixture(quiet_runner());

        assert!(fx.scheduler.refresh_all().await);

        assert!(matches!(
            fx.events.recv().await,
            Some(StatusEvent::SweepStarted)
        ));
        match fx.events.recv().await {
            Some(StatusEvent::RepoUnchecked { path }) => assert_eq!(path, fx.repo_path),
            other => panic!("expected RepoUnchecked, got {:?}", other),
        }
        match fx.events.recv().await {
            Some(StatusEvent::RepoStatus { path, flags }) => {
                assert_eq!(path, fx.repo_path);
                assert_eq!(flags, StatusFlags::default());
            }
            other => panic!("expected RepoStatus, got {:?}", other),
        }
        assert!(matches!(
            fx.events.recv().await,
            Some(StatusEvent::SweepFinished)
        ));
    }

    #[tokio::test]
    async fn test_sweep_result_is_applied_to_the_tree() {
        let runner = quiet_runner();
        runner.script_ok(LS_FILES, "edited.rs\n");
        let fx = fixture(runner);

        fx.scheduler.refresh_all().await;

        let tree = fx.scheduler.tree();
        let tree = tree.read().await;
        let repos = tree.repositories();
        assert_eq!(repos.len(), 1);
        let node = tree.find(&repos[0].0).unwrap();
        match &node.kind {
            NodeKind::Repository {
                status,
                status_checked,
                ..
            } => {
                assert!(status.needs_commit);
                assert!(*status_checked);
            }
            NodeKind::Folder => panic!("expected repository leaf"),
        }
    }

    #[tokio::test]
    async fn test_second_sweep_while_running_is_noop() {
        let fx = fixture(quiet_runner());

        let _sweep_guard = fx
            .scheduler
            .locks
            .try_acquire(LockScope::Scheduler, LockClass::Refresh)
            .unwrap();
        assert!(!fx.scheduler.refresh_all().await);
    }

    #[tokio::test]
    async fn test_back_to_back_repo_refresh_is_debounced() {
        let fx = fixture(quiet_runner());

        let _refresh_guard = fx
            .scheduler
            .locks
            .try_acquire(
                LockScope::Repository(fx.repo_path.clone()),
                LockClass::Refresh,
            )
            .unwrap();
        // The guard simulates the first request still being in flight.
        assert!(!fx.scheduler.refresh_repo(&fx.repo_path).await);

        let runner_calls = {
            drop(_refresh_guard);
            fx.scheduler.refresh_repo(&fx.repo_path).await
        };
        assert!(runner_calls);
    }

    #[tokio::test]
    async fn test_submit_is_debounced_while_mutation_guard_held() {
        let fx = fixture(quiet_runner());

        let _mutation_guard = fx
            .scheduler
            .locks
            .try_acquire(
                LockScope::Repository(fx.repo_path.clone()),
                LockClass::Mutation,
            )
            .unwrap();
        assert!(!fx.scheduler.submit(&fx.repo_path, RepoOperation::Push));
    }

    #[tokio::test]
    async fn test_submit_publishes_result_then_post_mutation_status() {
        let runner = quiet_runner();
        runner.script_ok("push origin main", "Everything up-to-date\n");
        let mut fx = fixture(runner);

        assert!(fx.scheduler.submit(&fx.repo_path, RepoOperation::Push));

        match fx.events.recv().await {
            Some(StatusEvent::OperationFinished {
                path,
                operation,
                result,
            }) => {
                assert_eq!(path, fx.repo_path);
                assert_eq!(operation, "push");
                assert_eq!(result.unwrap().message, "push done");
            }
            other => panic!("expected OperationFinished, got {:?}", other),
        }

        // The reconciling refresh follows the operation result.
        match fx.events.recv().await {
            Some(StatusEvent::RepoUnchecked { path }) => assert_eq!(path, fx.repo_path),
            other => panic!("expected RepoUnchecked, got {:?}", other),
        }
        assert!(matches!(
            fx.events.recv().await,
            Some(StatusEvent::RepoStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_operation_still_triggers_reconciling_refresh() {
        let runner = quiet_runner();
        runner.script_fail("merge dev", 1, "CONFLICT (content)\n");
        let mut fx = fixture(runner);

        assert!(fx.scheduler.submit(
            &fx.repo_path,
            RepoOperation::Merge {
                from: "dev".to_string()
            }
        ));

        match fx.events.recv().await {
            Some(StatusEvent::OperationFinished { result, .. }) => {
                assert!(result.is_err());
            }
            other => panic!("expected OperationFinished, got {:?}", other),
        }
        assert!(matches!(
            fx.events.recv().await,
            Some(StatusEvent::RepoUnchecked { .. })
        ));
        assert!(matches!(
            fx.events.recv().await,
            Some(StatusEvent::RepoStatus { .. })
        ));

        // The mutation guard was released despite the failure.
        assert!(fx
            .scheduler
            .locks
            .try_acquire(
                LockScope::Repository(fx.repo_path.clone()),
                LockClass::Mutation
            )
            .is_some());
    }

    async fn drain_sweep(
        events: &mut mpsc::UnboundedReceiver<StatusEvent>,
    ) -> Vec<StatusEvent> {
        let mut seen = Vec::new();
        loop {
            match events.recv().await {
                Some(StatusEvent::SweepFinished) => break,
                Some(event) => seen.push(event),
                None => panic!("event channel closed mid-sweep"),
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_sweep_skips_repo_while_targeted_refresh_in_flight() {
        let mut fx = fixture(quiet_runner());

        let refresh_guard = fx
            .scheduler
            .locks
            .try_acquire(
                LockScope::Repository(fx.repo_path.clone()),
                LockClass::Refresh,
            )
            .unwrap();

        // The sweep completes but must not apply a result for the repository
        // whose probe slot is owned by an in-flight targeted refresh: doing
        // so could overwrite a fresher result with an older one.
        assert!(fx.scheduler.refresh_all().await);
        let seen = drain_sweep(&mut fx.events).await;
        assert!(!seen
            .iter()
            .any(|event| matches!(event, StatusEvent::RepoStatus { .. })));

        // With the slot free again the next sweep probes and applies.
        drop(refresh_guard);
        assert!(fx.scheduler.refresh_all().await);
        let seen = drain_sweep(&mut fx.events).await;
        assert!(seen.iter().any(|event| matches!(
            event,
            StatusEvent::RepoStatus { path, .. } if *path == fx.repo_path
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweeps_fire_after_each_interval() {
        let mut fx = fixture(quiet_runner());
        let _ticker = fx.scheduler.spawn_periodic(Duration::from_secs(1800));

        // The first tick is consumed at spawn; each elapsed interval after
        // that triggers one full sweep.
        for _ in 0..2 {
            match fx.events.recv().await {
                Some(StatusEvent::SweepStarted) => {}
                other => panic!("expected SweepStarted, got {:?}", other),
            }
            let seen = drain_sweep(&mut fx.events).await;
            assert!(seen.iter().any(|event| matches!(
                event,
                StatusEvent::RepoStatus { path, .. } if *path == fx.repo_path
            )));
        }
    }
}
