//! Workflow supervisor and command fan-out
//!
//! Owns the map of live tasks and turns control-channel commands into
//! per-task background jobs. Jobs are tracked `JoinHandle`s, never
//! untracked fire-and-forget work, so shutdown can abort them and a busy
//! task can be detected. There is no cross-task ordering: every job runs
//! independently and reports only through command responses and logs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::control::{Message, MessageKind, Response};
use crate::models::TaskKind;
use crate::watch::WatchSet;
use crate::workflow::CheckoutWorkflow;

/// Pause between setup retries when the supervisor is looping a failing
/// task. The loop itself has no ceiling — a persistently failing task
/// holds its slot until shutdown.
const SETUP_RETRY_DELAY: Duration = Duration::from_secs(1);

struct TaskEntry {
    id: String,
    kind: TaskKind,
    watch: Arc<WatchSet>,
    stop: Arc<AtomicBool>,
    setup_complete: AtomicBool,
    workflow: tokio::sync::Mutex<CheckoutWorkflow>,
    job: Mutex<Option<JoinHandle<()>>>,
}

impl TaskEntry {
    fn job_active(&self) -> bool {
        self.job
            .lock()
            .expect("job lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn track(&self, handle: JoinHandle<()>) {
        *self.job.lock().expect("job lock poisoned") = Some(handle);
    }
}

/// Registry of live workflows plus the bulk-command surface.
#[derive(Default)]
pub struct Supervisor {
    tasks: RwLock<HashMap<String, Arc<TaskEntry>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow. Its id becomes the task identifier on the
    /// control channel.
    pub async fn insert(&self, workflow: CheckoutWorkflow) -> String {
        let id = workflow.id().to_string();
        let entry = Arc::new(TaskEntry {
            id: id.clone(),
            kind: workflow.kind(),
            watch: workflow.watch_handle(),
            stop: workflow.stop_handle(),
            setup_complete: AtomicBool::new(workflow.is_setup_complete()),
            workflow: tokio::sync::Mutex::new(workflow),
            job: Mutex::new(None),
        });
        self.tasks.write().await.insert(id.clone(), entry);
        info!(task = %id, "task registered");
        id
    }

    /// Route a batch of control messages; one tagged response per affected
    /// task. Unimplemented commands answer NotImplemented and are logged,
    /// never crashed on.
    pub async fn dispatch(&self, messages: Vec<Message>) -> Vec<Response> {
        let mut responses = Vec::new();
        for message in messages {
            metrics::counter!("control_commands_total", "kind" => message.kind.label())
                .increment(1);
            match message.kind {
                MessageKind::SetupAll => responses.extend(self.setup_all().await),
                MessageKind::StartAll => responses.extend(self.start_all().await),
                MessageKind::QuickTask => match (message.task_kind, message.variant_ids) {
                    (Some(kind), Some(ids)) if !ids.is_empty() => {
                        responses.extend(self.quick_task(kind, &ids).await);
                    }
                    _ => {
                        warn!("quick task message missing kind or variant ids");
                        responses.push(Response::invalid(message.task_id.unwrap_or_default()));
                    }
                },
                kind => {
                    warn!(kind = kind.label(), "command not implemented");
                    let task_id = message.task_id.unwrap_or_default();
                    if !task_id.is_empty() && !self.tasks.read().await.contains_key(&task_id) {
                        responses.push(Response::not_found(task_id));
                    } else {
                        responses.push(Response::not_implemented(task_id));
                    }
                }
            }
        }
        responses
    }

    /// Spawn a setup job for every task that hasn't completed setup.
    ///
    /// Each job reruns the workflow's setup until it succeeds; the
    /// workflow's internal ban ceiling is the only per-attempt bound.
    pub async fn setup_all(&self) -> Vec<Response> {
        let tasks = self.tasks.read().await;
        let mut responses = Vec::new();
        for entry in tasks.values() {
            if entry.setup_complete.load(Ordering::SeqCst) {
                continue;
            }
            if entry.job_active() {
                responses.push(Response::cannot_action(&entry.id));
                continue;
            }

            let job_entry = entry.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let result = job_entry.workflow.lock().await.setup().await;
                    match result {
                        Ok(()) => {
                            job_entry.setup_complete.store(true, Ordering::SeqCst);
                            info!(task = %job_entry.id, "setup finished");
                            break;
                        }
                        Err(err) => {
                            warn!(task = %job_entry.id, error = %err, "setup failed, retrying");
                            tokio::time::sleep(SETUP_RETRY_DELAY).await;
                        }
                    }
                }
            });
            entry.track(handle);
            responses.push(Response::success(&entry.id));
        }
        responses
    }

    /// Spawn the run phase for every setup-complete task. Tasks that are
    /// not set up or already busy answer CannotAction.
    pub async fn start_all(&self) -> Vec<Response> {
        let tasks = self.tasks.read().await;
        let mut responses = Vec::new();
        for entry in tasks.values() {
            if !entry.setup_complete.load(Ordering::SeqCst) || entry.job_active() {
                responses.push(Response::cannot_action(&entry.id));
                continue;
            }

            let job_entry = entry.clone();
            let handle = tokio::spawn(async move {
                let result = job_entry.workflow.lock().await.run().await;
                match result {
                    Ok(()) => info!(task = %job_entry.id, "run finished"),
                    Err(err) => warn!(task = %job_entry.id, error = %err, "run failed"),
                }
            });
            entry.track(handle);
            responses.push(Response::success(&entry.id));
        }
        responses
    }

    /// Merge variant ids into the watch set of every live task of the
    /// given kind.
    pub async fn quick_task(&self, kind: TaskKind, variant_ids: &[u64]) -> Vec<Response> {
        let tasks = self.tasks.read().await;
        let mut responses = Vec::new();
        for entry in tasks.values() {
            if entry.kind != kind {
                continue;
            }
            entry.watch.merge(variant_ids);
            info!(task = %entry.id, variants = variant_ids.len(), "watch set updated");
            responses.push(Response::success(&entry.id));
        }
        responses
    }

    /// Set every stop flag and abort all tracked jobs.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.read().await;
        for entry in tasks.values() {
            entry.stop.store(true, Ordering::SeqCst);
            if let Some(handle) = entry.job.lock().expect("job lock poisoned").take() {
                handle.abort();
            }
        }
        info!(tasks = tasks.len(), "supervisor shut down");
    }

    /// Task summary for the health endpoint.
    pub async fn health(&self) -> serde_json::Value {
        let tasks = self.tasks.read().await;
        let total = tasks.len();
        let setup_complete = tasks
            .values()
            .filter(|e| e.setup_complete.load(Ordering::SeqCst))
            .count();
        let jobs_active = tasks.values().filter(|e| e.job_active()).count();

        let mut entries: Vec<serde_json::Value> = tasks
            .values()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "kind": e.kind,
                    "setup_complete": e.setup_complete.load(Ordering::SeqCst),
                    "watching": e.watch.len(),
                })
            })
            .collect();
        entries.sort_by_key(|v| v["id"].as_str().map(|s| s.to_string()));

        serde_json::json!({
            "tasks_total": total,
            "tasks_setup_complete": setup_complete,
            "jobs_active": jobs_active,
            "tasks": entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ResponseKind;
    use crate::testutil::*;

    async fn supervisor_with(n: usize) -> (Supervisor, Vec<String>) {
        let supervisor = Supervisor::new();
        let mut ids = Vec::new();
        for _ in 0..n {
            let (wf, _h) = build_workflow(TaskKind::Variant, Arc::new(MockStorefront::happy()));
            ids.push(supervisor.insert(wf).await);
        }
        (supervisor, ids)
    }

    /// Poll supervisor health until the predicate holds or two seconds pass.
    async fn wait_until<F: Fn(&serde_json::Value) -> bool>(supervisor: &Supervisor, pred: F) {
        for _ in 0..200 {
            if pred(&supervisor.health().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached: {:?}", supervisor.health().await);
    }

    #[tokio::test]
    async fn setup_all_runs_every_pending_task() {
        let (supervisor, ids) = supervisor_with(2).await;

        let responses = supervisor.setup_all().await;
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.kind == ResponseKind::ActionSuccess));
        assert!(ids.iter().all(|id| responses.iter().any(|r| &r.task_id == id)));

        wait_until(&supervisor, |h| h["tasks_setup_complete"] == 2).await;

        // Already-complete tasks are unaffected by a second command.
        let responses = supervisor.setup_all().await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn start_all_requires_setup() {
        let (supervisor, _ids) = supervisor_with(1).await;

        let responses = supervisor.start_all().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::CannotAction);
    }

    #[tokio::test]
    async fn start_all_spawns_run_jobs_after_setup() {
        let (supervisor, _ids) = supervisor_with(1).await;

        supervisor.setup_all().await;
        wait_until(&supervisor, |h| h["tasks_setup_complete"] == 1).await;

        let responses = supervisor.start_all().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::ActionSuccess);
        wait_until(&supervisor, |h| h["jobs_active"] == 1).await;

        supervisor.shutdown().await;
        wait_until(&supervisor, |h| h["jobs_active"] == 0).await;
    }

    #[tokio::test]
    async fn quick_task_merges_only_matching_kind() {
        let supervisor = Supervisor::new();
        let (variant_wf, variant_h) =
            build_workflow(TaskKind::Variant, Arc::new(MockStorefront::happy()));
        let (product_wf, product_h) =
            build_workflow(TaskKind::Product, Arc::new(MockStorefront::happy()));
        let variant_id = supervisor.insert(variant_wf).await;
        supervisor.insert(product_wf).await;

        let responses = supervisor
            .quick_task(TaskKind::Variant, &[115604, 118563])
            .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].task_id, variant_id);
        assert_eq!(variant_h.watch.len(), 2);
        assert!(product_h.watch.is_empty());
    }

    #[tokio::test]
    async fn dispatch_answers_unimplemented_commands() {
        let (supervisor, ids) = supervisor_with(1).await;

        let responses = supervisor
            .dispatch(vec![
                Message {
                    kind: MessageKind::Create,
                    task_id: None,
                    task_kind: None,
                    variant_ids: None,
                },
                Message {
                    kind: MessageKind::Stop,
                    task_id: Some(ids[0].clone()),
                    task_kind: None,
                    variant_ids: None,
                },
                Message {
                    kind: MessageKind::Delete,
                    task_id: Some("no-such-task".into()),
                    task_kind: None,
                    variant_ids: None,
                },
            ])
            .await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].kind, ResponseKind::NotImplemented);
        assert_eq!(responses[1].kind, ResponseKind::NotImplemented);
        assert_eq!(responses[1].task_id, ids[0]);
        assert_eq!(responses[2].kind, ResponseKind::TaskNotFound);
    }

    #[tokio::test]
    async fn dispatch_rejects_malformed_quick_task() {
        let (supervisor, _ids) = supervisor_with(1).await;

        let responses = supervisor
            .dispatch(vec![Message {
                kind: MessageKind::QuickTask,
                task_id: None,
                task_kind: Some(TaskKind::Variant),
                variant_ids: None,
            }])
            .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::InvalidMessage);
    }

    #[tokio::test]
    async fn dispatch_routes_bulk_commands() {
        let (supervisor, _ids) = supervisor_with(2).await;

        let responses = supervisor
            .dispatch(vec![Message {
                kind: MessageKind::SetupAll,
                task_id: None,
                task_kind: None,
                variant_ids: None,
            }])
            .await;

        assert_eq!(responses.len(), 2);
        wait_until(&supervisor, |h| h["tasks_setup_complete"] == 2).await;
    }

    #[tokio::test]
    async fn health_reports_task_counts() {
        let (supervisor, _ids) = supervisor_with(2).await;

        let health = supervisor.health().await;
        assert_eq!(health["tasks_total"], 2);
        assert_eq!(health["tasks_setup_complete"], 0);
        assert_eq!(health["jobs_active"], 0);
        assert_eq!(health["tasks"].as_array().unwrap().len(), 2);
    }
}
