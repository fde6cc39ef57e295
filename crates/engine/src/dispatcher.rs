//! The worker pool that claims and executes ready actions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use corral_action::{Action, ActionOutcome, ActionStatus, Cause, Schedule};
use corral_core::{ActionId, WorkerId};
use corral_policy::{PolicyPipeline, PolicyRegistry};
use corral_storage::{StorageError, StorageGateway};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handler::HandlerRegistry;

/// How a finished round commits.
enum Terminal {
    Succeeded,
    Failed(String),
    Cancelled(String),
}

/// Concurrency coordinator: a fixed pool of workers pulling ready actions.
///
/// The claim protocol is CAS on the action's `owner` against the store; a
/// lost race is skipped silently. After claiming, the worker takes the
/// target's persisted lock, runs the BEFORE hooks, executes the handler,
/// runs the AFTER hooks, commits the terminal status, releases both locks,
/// and promotes any dependents that became satisfied. A background sweep
/// fails actions that have been running longer than their timeout, so
/// dependents are never wedged behind a stuck worker.
pub struct Dispatcher {
    store: Arc<dyn StorageGateway>,
    config: EngineConfig,
    handlers: Arc<HandlerRegistry>,
    pipeline: PolicyPipeline,
    context: ExecutionContext,
    notify: Arc<Notify>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher, verifying the handler table is total.
    pub fn new(
        store: Arc<dyn StorageGateway>,
        config: EngineConfig,
        handlers: Arc<HandlerRegistry>,
        policies: Arc<PolicyRegistry>,
    ) -> Result<Arc<Self>, EngineError> {
        handlers.validate()?;
        let notify = Arc::new(Notify::new());
        let context = ExecutionContext::new(
            store.clone(),
            config.clone(),
            policies.clone(),
            notify.clone(),
        );
        Ok(Arc::new(Self {
            store,
            config,
            handlers,
            pipeline: PolicyPipeline::new(policies),
            context,
            notify,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }))
    }

    /// Spawn the worker pool and the timeout sweeper.
    pub fn start(self: &Arc<Self>) {
        info!(workers = self.config.workers, "starting dispatcher");
        let mut tasks = self.tasks.lock();
        for _ in 0..self.config.workers {
            let this = Arc::clone(self);
            let worker = WorkerId::v4();
            tasks.push(tokio::spawn(async move { this.worker_loop(worker).await }));
        }
        let this = Arc::clone(self);
        tasks.push(tokio::spawn(async move { this.sweeper_loop().await }));
    }

    /// Stop all workers and wait for them to drain.
    pub async fn shutdown(&self) {
        info!("stopping dispatcher");
        self.shutdown.cancel();
        self.notify.notify_waiters();
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Hint that new ready work exists. Safe to call redundantly; workers
    /// also poll, so a dropped wakeup only costs latency.
    pub fn notify_ready(&self) {
        self.notify.notify_waiters();
    }

    /// The execution context handlers run under.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Request cancellation of an action.
    ///
    /// Pending actions are cancelled immediately; running ones get the
    /// cooperative flag set and finish at the worker's next observation
    /// point (or the timeout sweep). Terminal actions are left alone.
    pub async fn cancel_action(&self, id: ActionId) -> Result<(), EngineError> {
        let mut action = self
            .store
            .get_action(id)
            .await?
            .ok_or_else(|| EngineError::target_not_found("action", id))?;

        if action.status.is_terminal() {
            return Ok(());
        }
        if action.status == ActionStatus::Running {
            action.request_cancel();
            self.store.update_action(&action).await?;
            return Ok(());
        }
        self.store.mark_cancelled(id, "cancelled by request").await?;
        self.propagate_completion(id).await?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn worker_loop(self: Arc<Self>, worker: WorkerId) {
        debug!(worker = %worker, "worker started");
        loop {
            loop {
                if self.shutdown.is_cancelled() {
                    return;
                }
                match self.claim_next(worker).await {
                    Ok(Some(action)) => {
                        if let Err(e) = self.run_action(action, worker).await {
                            warn!(worker = %worker, "action round faulted: {e}");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(worker = %worker, "claim attempt failed: {e}");
                        break;
                    }
                }
            }
            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = self.notify.notified() => {}
                () = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
            }
        }
    }

    /// Claim one ready action: CAS the owner, then take the target lock.
    /// Both kinds of contention are silently skipped.
    async fn claim_next(&self, worker: WorkerId) -> Result<Option<Action>, EngineError> {
        let now = Utc::now();
        for candidate in self.store.list_ready_actions().await? {
            if !candidate.is_claimable(now) {
                continue;
            }
            if !self
                .store
                .compare_and_set_owner(candidate.id, None, Some(worker))
                .await?
            {
                continue;
            }
            let lock_key = candidate.target.lock_key();
            if !self.store.try_lock_target(&lock_key, candidate.id).await? {
                // target busy — hand the action back
                self.store
                    .compare_and_set_owner(candidate.id, Some(worker), None)
                    .await?;
                continue;
            }
            // re-read under the claim so we execute the current record; a
            // record that left Ready in the meantime (cancelled) is handed
            // back
            match self.store.get_action(candidate.id).await? {
                Some(action) if action.status == ActionStatus::Ready => {
                    return Ok(Some(action));
                }
                _ => {
                    self.store.unlock_target(&lock_key, candidate.id).await?;
                    self.store
                        .compare_and_set_owner(candidate.id, Some(worker), None)
                        .await?;
                }
            }
        }
        Ok(None)
    }

    async fn run_action(&self, action: Action, worker: WorkerId) -> Result<(), EngineError> {
        let id = action.id;
        let lock_key = action.target.lock_key();
        let result = self.run_claimed(action, worker).await;
        if let Err(e) = &result {
            // fail the round so dependents are not wedged behind it
            if let Err(mark_err) = self.store.mark_failed(id, &e.to_string()).await {
                debug!(action_id = %id, "could not fail faulted action: {mark_err}");
            }
            self.store.unlock_target(&lock_key, id).await?;
            self.propagate_completion(id).await?;
            self.notify.notify_waiters();
        }
        result
    }

    async fn run_claimed(&self, mut action: Action, worker: WorkerId) -> Result<(), EngineError> {
        let lock_key = action.target.lock_key();
        action.set_status(ActionStatus::Running)?;
        self.store.update_action(&action).await?;
        info!(action_id = %action.id, kind = %action.kind, worker = %worker, "executing action");

        if action.cancel_requested {
            return self
                .finish(&mut action, Terminal::Cancelled("cancel requested".into()), &lock_key)
                .await;
        }

        let policy_ctx = self.context.policy_context();
        if let Some(rejection) = self.pipeline.run_before(&mut action, &policy_ctx).await {
            warn!(action_id = %action.id, reason = %rejection.reason, "action rejected by policy");
            return self
                .finish(&mut action, Terminal::Failed(rejection.reason), &lock_key)
                .await;
        }

        let handler = self
            .handlers
            .get(action.kind)
            .ok_or_else(|| EngineError::MissingHandlers {
                kinds: action.kind.to_string(),
            })?;
        let outcome = handler.execute(&mut action, &self.context).await;

        match outcome {
            Err(e) => {
                self.finish(&mut action, Terminal::Failed(e.to_string()), &lock_key)
                    .await
            }
            Ok(ActionOutcome::Retry) => self.requeue(&mut action, &lock_key).await,
            Ok(ActionOutcome::Error) => {
                let reason = if action.status_reason.is_empty() {
                    "execution failed".to_string()
                } else {
                    action.status_reason.clone()
                };
                self.finish(&mut action, Terminal::Failed(reason), &lock_key)
                    .await
            }
            Ok(ActionOutcome::Ok) => {
                // a cancel request may have landed on the stored record
                // while the handler was executing
                let cancel_seen = action.cancel_requested
                    || self
                        .store
                        .get_action(action.id)
                        .await?
                        .is_some_and(|stored| stored.cancel_requested);
                if cancel_seen {
                    action.cancel_requested = true;
                    return self
                        .finish(
                            &mut action,
                            Terminal::Cancelled("cancel requested".into()),
                            &lock_key,
                        )
                        .await;
                }
                self.pipeline.run_after(&action, &policy_ctx).await;
                self.finish(&mut action, Terminal::Succeeded, &lock_key).await
            }
        }
    }

    /// Return a retryable action to the ready queue, or fail it once the
    /// budget is spent.
    async fn requeue(&self, action: &mut Action, lock_key: &str) -> Result<(), EngineError> {
        if action.retries >= self.config.max_retries {
            return self
                .finish(
                    action,
                    Terminal::Failed(format!(
                        "retry limit exceeded after {} attempts",
                        action.retries + 1
                    )),
                    lock_key,
                )
                .await;
        }
        action.retries += 1;
        action.owner = None;
        action.set_status(ActionStatus::Ready)?;
        self.store.update_action(action).await?;
        self.store.unlock_target(lock_key, action.id).await?;
        debug!(action_id = %action.id, retries = action.retries, "requeued for retry");
        self.notify.notify_waiters();
        Ok(())
    }

    /// Commit a terminal state, release the target, and wake dependents.
    ///
    /// If the sweeper already finalized the record (timeout while we were
    /// executing), the in-flight result is dropped rather than overwriting
    /// a terminal status.
    async fn finish(
        &self,
        action: &mut Action,
        terminal: Terminal,
        lock_key: &str,
    ) -> Result<(), EngineError> {
        let already_terminal = self
            .store
            .get_action(action.id)
            .await?
            .is_some_and(|stored| stored.status.is_terminal());

        if already_terminal {
            debug!(action_id = %action.id, "record finalized elsewhere; dropping round result");
        } else {
            self.store.update_action(action).await?;
            let commit = match &terminal {
                Terminal::Succeeded => self.store.mark_succeeded(action.id).await,
                Terminal::Failed(reason) => self.store.mark_failed(action.id, reason).await,
                Terminal::Cancelled(reason) => {
                    self.store.mark_cancelled(action.id, reason).await
                }
            };
            match commit {
                Ok(()) => {
                    if matches!(terminal, Terminal::Succeeded) && action.interval >= 0 {
                        self.rearm(action).await?;
                    }
                }
                Err(StorageError::Conflict(c)) => {
                    debug!(action_id = %action.id, "terminal commit lost a race: {c}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store.unlock_target(lock_key, action.id).await?;
        self.propagate_completion(action.id).await?;
        self.notify.notify_waiters();
        Ok(())
    }

    /// A succeeded repeating action schedules a fresh follow-up record; a
    /// terminal record is never resurrected.
    async fn rearm(&self, action: &Action) -> Result<(), EngineError> {
        let mut next = Action::new(
            action.kind,
            Some(action.target),
            Cause::DerivedFrom {
                action_id: action.id,
            },
        )?
        .with_name(action.name.clone())
        .with_inputs(action.inputs.clone())
        .with_timeout(action.timeout)
        .with_interval(action.interval)
        .with_start_time(Schedule::at(
            Utc::now() + chrono::Duration::seconds(action.interval),
        ));
        next.analyze_dependencies()?;
        let next_id = self.store.create_action(next).await?;
        debug!(action_id = %action.id, next = %next_id, interval = action.interval,
               "re-armed repeating action");
        Ok(())
    }

    /// Recompute readiness for everything that depends on a finished
    /// action: satisfied dependents are promoted to ready, and a failed or
    /// cancelled dependency fails its dependents transitively.
    fn propagate_completion(
        &self,
        id: ActionId,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>> {
        Box::pin(async move {
            let Some(completed) = self.store.get_action(id).await? else {
                return Ok(());
            };
            for dependent_id in completed.depended_by {
                let Some(dependent) = self.store.get_action(dependent_id).await? else {
                    continue;
                };
                if dependent.status != ActionStatus::Waiting {
                    continue;
                }

                let mut blocked = false;
                let mut failed_dependency = None;
                for dep_id in &dependent.depends_on {
                    match self.store.get_action(*dep_id).await? {
                        Some(dep) if dep.status == ActionStatus::Succeeded => {}
                        Some(dep) if dep.status.is_terminal() => {
                            failed_dependency = Some(dep.id);
                            break;
                        }
                        Some(_) => {
                            blocked = true;
                            break;
                        }
                        None => {
                            failed_dependency = Some(*dep_id);
                            break;
                        }
                    }
                }

                if let Some(failed_id) = failed_dependency {
                    warn!(action_id = %dependent_id, dependency = %failed_id,
                          "failing dependent of failed dependency");
                    self.store
                        .mark_failed(dependent_id, &format!("dependency {failed_id} failed"))
                        .await?;
                    self.propagate_completion(dependent_id).await?;
                } else if !blocked {
                    let mut promoted = dependent;
                    promoted.set_status(ActionStatus::Ready)?;
                    self.store.update_action(&promoted).await?;
                    debug!(action_id = %dependent_id, "dependent promoted to ready");
                    self.notify.notify_waiters();
                }
            }
            Ok(())
        })
    }

    async fn sweeper_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
            }
            if let Err(e) = self.sweep_timeouts().await {
                warn!("timeout sweep failed: {e}");
            }
        }
    }

    /// Fail running actions that outlived their timeout and release their
    /// locks so dependents can be unblocked.
    async fn sweep_timeouts(&self) -> Result<(), EngineError> {
        let now = Utc::now();
        for action in self.store.list_running_actions().await? {
            if !action.is_timed_out(now) {
                continue;
            }
            warn!(action_id = %action.id, timeout = action.timeout, "action timed out");
            let reason = format!("timed out after {} seconds", action.timeout);
            match self.store.mark_failed(action.id, &reason).await {
                Ok(()) => {}
                // finished in the meantime — nothing to sweep
                Err(StorageError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
            self.store
                .unlock_target(&action.target.lock_key(), action.id)
                .await?;
            self.propagate_completion(action.id).await?;
            self.notify.notify_waiters();
        }
        Ok(())
    }
}
