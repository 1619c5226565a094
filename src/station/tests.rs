use super::*;
use crate::station::client::Mutation;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replays queued values, repeating the last one once the queue drains.
struct Script<T: Clone> {
    queue: VecDeque<T>,
    last: Option<T>,
}

impl<T: Clone> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, value: T) {
        self.queue.push_back(value);
    }

    fn next(&mut self) -> Option<T> {
        if let Some(value) = self.queue.pop_front() {
            self.last = Some(value.clone());
        }
        self.last.clone()
    }
}

#[derive(Default)]
struct FakeState {
    overviews: Script<Value>,
    task_states: Script<&'static str>,
    replies: Script<std::result::Result<Value, u16>>,
    container_info: Option<Value>,
    app_info: Option<Value>,
    volumes: Option<Value>,
    volume_info: Option<Value>,
    submissions: Vec<Mutation>,
    overview_calls: usize,
    task_polls: usize,
}

/// In-memory station: scripted overviews, task states and mutation replies.
#[derive(Default, Clone)]
struct FakeStation {
    state: Arc<Mutex<FakeState>>,
}

const TASK_ID: &str = "task-1";

impl FakeStation {
    fn new() -> Self {
        Self::default()
    }

    fn with_overview(self, value: Value) -> Self {
        self.state.lock().unwrap().overviews.push(value);
        self
    }

    /// `"not-found"` leaves the task out of the list entirely.
    fn with_task_states(self, states: &[&'static str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for s in states {
                state.task_states.push(*s);
            }
        }
        self
    }

    fn with_reply(self, value: Value) -> Self {
        self.state.lock().unwrap().replies.push(Ok(value));
        self
    }

    fn with_reply_status(self, status: u16) -> Self {
        self.state.lock().unwrap().replies.push(Err(status));
        self
    }

    fn with_container_info(self, value: Value) -> Self {
        self.state.lock().unwrap().container_info = Some(value);
        self
    }

    fn with_app_info(self, value: Value) -> Self {
        self.state.lock().unwrap().app_info = Some(value);
        self
    }

    fn with_volumes(self, value: Value) -> Self {
        self.state.lock().unwrap().volumes = Some(value);
        self
    }

    fn with_volume_info(self, value: Value) -> Self {
        self.state.lock().unwrap().volume_info = Some(value);
        self
    }

    fn submissions(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn overview_calls(&self) -> usize {
        self.state.lock().unwrap().overview_calls
    }

    fn task_polls(&self) -> usize {
        self.state.lock().unwrap().task_polls
    }

    fn reconciler(&self, policy: PollPolicy) -> Reconciler {
        Reconciler::new(Arc::new(self.clone()), policy)
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Result<T> {
    serde_json::from_value(value.unwrap_or_else(|| json!({})))
        .map_err(|e| StationError::decode("fake", e))
}

#[async_trait]
impl StationApi for FakeStation {
    async fn overview(&self) -> Result<Overview> {
        let mut state = self.state.lock().unwrap();
        state.overview_calls += 1;
        let value = state.overviews.next();
        from_value(value)
    }

    async fn tasks(&self) -> Result<TaskList> {
        let mut state = self.state.lock().unwrap();
        state.task_polls += 1;
        let mut items = vec![json!({"id": "unrelated", "state": "completed"})];
        match state.task_states.next() {
            Some("not-found") | None => {}
            Some(task_state) => items.push(json!({"id": TASK_ID, "state": task_state})),
        }
        from_value(Some(json!({"data": {"items": items}})))
    }

    async fn containers(&self) -> Result<ContainerList> {
        from_value(None)
    }

    async fn inspect_container(&self, _container: &ContainerRef) -> Result<ContainerInfo> {
        let value = self.state.lock().unwrap().container_info.clone();
        from_value(value)
    }

    async fn inspect_application(&self, _name: &str) -> Result<AppInfo> {
        let value = self.state.lock().unwrap().app_info.clone();
        from_value(value)
    }

    async fn volumes(&self) -> Result<VolumeList> {
        let value = self.state.lock().unwrap().volumes.clone();
        from_value(value)
    }

    async fn inspect_volume(&self, _name: &str) -> Result<VolumeInfo> {
        let value = self.state.lock().unwrap().volume_info.clone();
        from_value(value)
    }

    async fn submit(&self, mutation: Mutation) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(mutation);
        match state.replies.next() {
            Some(Ok(value)) => Ok(serde_json::to_vec(&value).unwrap()),
            Some(Err(status)) => Err(StationError::Status {
                status,
                body: "internal error".to_string(),
            }),
            None => Ok(serde_json::to_vec(&json!({"data": {"taskID": TASK_ID}})).unwrap()),
        }
    }
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(5)),
    }
}

fn empty_overview() -> Value {
    json!({"data": {"app": [], "container": []}})
}

fn overview_with_container(id: &str, name: &str, status: &str) -> Value {
    json!({"data": {"app": [], "container": [
        {"id": id, "name": name, "type": "docker", "status": status}
    ]}})
}

fn overview_with_app(name: &str, status: &str) -> Value {
    json!({"data": {"app": [{"name": name, "status": status}], "container": []}})
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_container_polls_until_completed() {
    let station = FakeStation::new()
        .with_overview(empty_overview())
        .with_overview(overview_with_container("abc123", "web1", "running"))
        .with_task_states(&["running", "running", "completed"])
        .with_container_info(json!({"data": {"id": "abc123", "name": "web1", "image": "nginx"}}));

    let info = station
        .reconciler(fast_policy())
        .create_container(ContainerSpec::new("web1", "nginx"))
        .await
        .unwrap();

    assert_eq!(info.data.id, "abc123");
    assert_eq!(info.data.image, "nginx");
    assert_eq!(info.data.status, "running");
    assert_eq!(station.task_polls(), 3);

    let submissions = station.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].method, Method::POST);
    assert_eq!(submissions[0].endpoint, "containers");
    assert_eq!(submissions[0].body["name"], "web1");
    assert_eq!(submissions[0].body["image"], "nginx");
    assert_eq!(submissions[0].body["operation"], "create");
}

#[tokio::test]
async fn test_create_container_name_taken_sends_nothing() {
    let station = FakeStation::new().with_overview(overview_with_container("abc123", "web1", "running"));

    let result = station
        .reconciler(fast_policy())
        .create_container(ContainerSpec::new("web1", "nginx"))
        .await;

    match result {
        Err(StationError::AlreadyExists { kind, name }) => {
            assert_eq!(kind, ResourceKind::Container);
            assert_eq!(name, "web1");
        }
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
    assert!(station.submissions().is_empty());
    assert_eq!(station.task_polls(), 0);
}

#[tokio::test]
async fn test_recreate_container_bypasses_name_check() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "running"))
        .with_overview(overview_with_container("fff999", "web1", "running"))
        .with_task_states(&["completed"]);

    let mut spec = ContainerSpec::new("web1", "nginx");
    spec.operation = CreateMode::Recreate;
    let info = station
        .reconciler(fast_policy())
        .create_container(spec)
        .await
        .unwrap();

    assert_eq!(info.data.status, "running");
    let submissions = station.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].body["operation"], "recreate");
}

#[tokio::test]
async fn test_create_container_missing_afterwards() {
    let station = FakeStation::new()
        .with_overview(empty_overview())
        .with_task_states(&["completed"]);

    let result = station
        .reconciler(fast_policy())
        .create_container(ContainerSpec::new("web1", "nginx"))
        .await;

    assert!(matches!(
        result,
        Err(StationError::NotFoundAfterCreate { kind: ResourceKind::Container, ref name }) if name == "web1"
    ));
}

#[tokio::test]
async fn test_stop_container_wrong_status_is_incomplete() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "paused"))
        .with_task_states(&["completed"]);

    let result = station
        .reconciler(fast_policy())
        .stop_container(&ContainerRef::new("abc123", "docker"))
        .await;

    match result {
        Err(StationError::OperationIncomplete {
            kind,
            operation,
            identity,
            observed,
        }) => {
            assert_eq!(kind, ResourceKind::Container);
            assert_eq!(operation, "stop");
            assert_eq!(identity, "abc123");
            assert_eq!(observed.as_deref(), Some("paused"));
        }
        other => panic!("expected OperationIncomplete, got {:?}", other),
    }

    let submissions = station.submissions();
    assert_eq!(submissions[0].method, Method::PUT);
    assert_eq!(submissions[0].endpoint, "containers/stop");
}

#[tokio::test]
async fn test_stop_container_reaches_stopped() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "stopped"))
        .with_task_states(&["running", "completed"]);

    station
        .reconciler(fast_policy())
        .stop_container(&ContainerRef::new("abc123", "docker"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_start_container_requires_exact_status() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "Running"))
        .with_task_states(&["completed"]);

    let result = station
        .reconciler(fast_policy())
        .start_container(&ContainerRef::new("abc123", "docker"))
        .await;

    assert!(matches!(result, Err(StationError::OperationIncomplete { .. })));
}

#[tokio::test]
async fn test_start_container_absent_is_incomplete() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("zzz000", "other", "running"))
        .with_task_states(&["completed"]);

    let result = station
        .reconciler(fast_policy())
        .start_container(&ContainerRef::new("abc123", "docker"))
        .await;

    assert!(matches!(
        result,
        Err(StationError::OperationIncomplete { observed: None, .. })
    ));
}

#[tokio::test]
async fn test_delete_container_skips_inventory() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "running"))
        .with_task_states(&["not-found", "completed"]);

    station
        .reconciler(fast_policy())
        .delete_container(&ContainerRef::new("abc123", "docker"), true)
        .await
        .unwrap();

    assert_eq!(station.overview_calls(), 0);
    let submissions = station.submissions();
    assert_eq!(submissions[0].method, Method::DELETE);
    assert_eq!(submissions[0].body["data"]["removeVolumes"], json!(true));
}

#[tokio::test]
async fn test_submit_failure_propagates() {
    let station = FakeStation::new().with_reply_status(500);

    let result = station
        .reconciler(fast_policy())
        .start_container(&ContainerRef::new("abc123", "docker"))
        .await;

    let err = result.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(station.task_polls(), 0);
}

#[tokio::test]
async fn test_reply_without_task_id_is_decode_error() {
    let station = FakeStation::new().with_reply(json!({"data": {}}));

    let result = station
        .reconciler(fast_policy())
        .stop_container(&ContainerRef::new("abc123", "docker"))
        .await;

    assert!(matches!(result, Err(StationError::Decode { .. })));
    assert_eq!(station.task_polls(), 0);
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_application_stamps_status() {
    let station = FakeStation::new()
        .with_overview(empty_overview())
        .with_overview(overview_with_app("blog", "running"))
        .with_task_states(&["running", "completed"])
        .with_app_info(json!({"data": {"yml": "services: {}", "containers": [{"id": "c1", "name": "blog_web_1"}]}}));

    let info = station
        .reconciler(fast_policy())
        .create_application(AppSpec::new("blog", "services: {}"))
        .await
        .unwrap();

    assert_eq!(info.data.status, "running");
    assert_eq!(info.data.containers.len(), 1);
    assert_eq!(station.submissions()[0].endpoint, "apps/compose");
}

#[tokio::test]
async fn test_create_application_name_taken() {
    let station = FakeStation::new().with_overview(overview_with_app("blog", "stopped"));

    let result = station
        .reconciler(fast_policy())
        .create_application(AppSpec::new("blog", "services: {}"))
        .await;

    assert!(matches!(
        result,
        Err(StationError::AlreadyExists { kind: ResourceKind::Application, .. })
    ));
    assert!(station.submissions().is_empty());
}

#[tokio::test]
async fn test_create_application_missing_afterwards() {
    let station = FakeStation::new()
        .with_overview(empty_overview())
        .with_task_states(&["completed"]);

    let result = station
        .reconciler(fast_policy())
        .create_application(AppSpec::new("blog", "services: {}"))
        .await;

    assert!(matches!(
        result,
        Err(StationError::NotFoundAfterCreate { kind: ResourceKind::Application, .. })
    ));
}

#[tokio::test]
async fn test_start_application() {
    let station = FakeStation::new()
        .with_overview(overview_with_app("blog", "running"))
        .with_task_states(&["completed"]);

    station
        .reconciler(fast_policy())
        .start_application("blog")
        .await
        .unwrap();

    let submissions = station.submissions();
    assert_eq!(submissions[0].endpoint, "apps/start");
    assert_eq!(submissions[0].body, json!({"apps": ["blog"]}));
}

#[tokio::test]
async fn test_inspect_application_reads_status_from_overview() {
    let station = FakeStation::new()
        .with_overview(overview_with_app("blog", "stopped"))
        .with_app_info(json!({"data": {"yml": "services: {}"}}));

    let info = station
        .reconciler(fast_policy())
        .inspect_application("blog")
        .await
        .unwrap();

    assert_eq!(info.data.status, "stopped");
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_poll_loop_never_completes_on_running_or_not_found() {
    let station = FakeStation::new().with_task_states(&["not-found", "running", "not-found", "running"]);
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        timeout: Some(Duration::from_millis(50)),
    };

    let result = TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &policy, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(StationError::Timeout { ref task_id, .. }) if task_id == TASK_ID));
    assert!(station.task_polls() > 4);
}

#[tokio::test]
async fn test_poll_loop_failed_task_is_not_success() {
    let station = FakeStation::new().with_task_states(&["running", "failed"]);

    let result = TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &fast_policy(), &CancellationToken::new())
        .await;

    match result {
        Err(StationError::TaskFailed { task_id, state }) => {
            assert_eq!(task_id, TASK_ID);
            assert_eq!(state, "failed");
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poll_loop_completed_match_is_case_sensitive() {
    let station = FakeStation::new().with_task_states(&["COMPLETED", "Completed"]);
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        timeout: Some(Duration::from_millis(30)),
    };

    let result = TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &policy, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(StationError::Timeout { .. })));
}

#[tokio::test]
async fn test_poll_loop_unknown_state_keeps_polling() {
    let station = FakeStation::new().with_task_states(&["error", "pending", "completed"]);

    TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &fast_policy(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(station.task_polls(), 3);
}

#[tokio::test]
async fn test_poll_loop_cancelled_task_reports_raw_state() {
    let station = FakeStation::new().with_task_states(&["queued", "cancelled"]);

    let result = TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &fast_policy(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(StationError::TaskFailed { ref state, .. }) if state == "cancelled"
    ));
}

#[tokio::test]
async fn test_poll_loop_honours_cancellation() {
    let station = FakeStation::new().with_task_states(&["running"]);
    let policy = PollPolicy {
        interval: Duration::from_millis(5),
        timeout: None,
    };
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        })
    };

    let result = TaskTracker::new(&station)
        .wait_for_completion(TASK_ID, &policy, &token)
        .await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(StationError::Cancelled { .. })));
}

#[tokio::test]
async fn test_task_state_lookup() {
    let station = FakeStation::new().with_task_states(&["running", "not-found"]);
    let tracker = TaskTracker::new(&station);

    assert_eq!(tracker.state(TASK_ID).await.unwrap(), TaskState::Running);
    assert_eq!(tracker.state(TASK_ID).await.unwrap(), TaskState::NotFound);
    assert_eq!(tracker.state("unrelated").await.unwrap(), TaskState::Completed);
}

#[tokio::test]
async fn test_reconciler_cancellation_aborts_change() {
    let station = FakeStation::new().with_task_states(&["running"]);
    let token = CancellationToken::new();
    token.cancel();

    let reconciler = station
        .reconciler(PollPolicy {
            interval: Duration::from_millis(1),
            timeout: None,
        })
        .with_cancellation(token);

    let result = reconciler.start_application("blog").await;
    assert!(matches!(result, Err(StationError::Cancelled { .. })));
    assert_eq!(station.overview_calls(), 0);
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_volume_accepted_returns_inspection() {
    let station = FakeStation::new()
        .with_volumes(json!({"data": {"items": [{"name": "other"}]}}))
        .with_reply(json!({"data": {}}))
        .with_volume_info(json!({"data": {"volumeInfo": {"Name": "v1", "Driver": "local"}}}));

    let info = station
        .reconciler(fast_policy())
        .volumes()
        .create("v1")
        .await
        .unwrap();

    assert_eq!(info.data.volume_info.name, "v1");
    assert_eq!(station.task_polls(), 0);
    let submissions = station.submissions();
    assert_eq!(submissions[0].method, Method::POST);
    assert_eq!(submissions[0].endpoint, "volumes");
    assert_eq!(submissions[0].body, json!({"name": "v1"}));
}

#[tokio::test]
async fn test_create_volume_rejected_keeps_message() {
    let station = FakeStation::new()
        .with_volumes(json!({"data": {"items": []}}))
        .with_reply(json!({"code": 400, "message": "Volume name contains invalid characters"}));

    let result = station.reconciler(fast_policy()).volumes().create("v 1").await;

    match result {
        Err(StationError::RemoteRejected { code, message }) => {
            assert_eq!(code, Some(400));
            assert_eq!(message, "Volume name contains invalid characters");
        }
        other => panic!("expected RemoteRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_volume_name_taken_sends_nothing() {
    let station = FakeStation::new().with_volumes(json!({"data": {"items": [{"name": "v1"}]}}));

    let result = station.reconciler(fast_policy()).volumes().create("v1").await;

    assert!(matches!(
        result,
        Err(StationError::AlreadyExists { kind: ResourceKind::Volume, .. })
    ));
    assert!(station.submissions().is_empty());
}

#[tokio::test]
async fn test_delete_volume_done_after_task() {
    let station = FakeStation::new().with_task_states(&["running", "completed"]);

    station
        .reconciler(fast_policy())
        .volumes()
        .delete("v1")
        .await
        .unwrap();

    assert_eq!(station.overview_calls(), 0);
    assert_eq!(station.task_polls(), 2);
    let submissions = station.submissions();
    assert_eq!(submissions[0].method, Method::DELETE);
    assert_eq!(
        submissions[0].body,
        json!({"data": {"items": [{"name": "v1"}]}})
    );
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reconcile_create_returns_detail() {
    let station = FakeStation::new()
        .with_overview(empty_overview())
        .with_overview(overview_with_container("abc123", "web1", "running"))
        .with_task_states(&["completed"])
        .with_container_info(json!({"data": {"id": "abc123", "name": "web1"}}));

    let reconciled = station
        .reconciler(fast_policy())
        .reconcile(
            ResourceDescriptor::NewContainer(ContainerSpec::new("web1", "nginx")),
            Operation::Recreate,
        )
        .await
        .unwrap();

    assert_eq!(reconciled.kind, ResourceKind::Container);
    assert_eq!(reconciled.operation, Operation::Recreate);
    assert!(matches!(
        reconciled.resource,
        Some(ResourceDetail::Container(ref info)) if info.data.status == "running"
    ));
    assert_eq!(station.submissions()[0].body["operation"], "recreate");
}

#[tokio::test]
async fn test_reconcile_unsupported_pairs_send_nothing() {
    let station = FakeStation::new();
    let reconciler = station.reconciler(fast_policy());

    for (descriptor, operation) in [
        (ResourceDescriptor::Volume("v1".into()), Operation::Start),
        (ResourceDescriptor::Volume("v1".into()), Operation::Recreate),
        (
            ResourceDescriptor::NewContainer(ContainerSpec::new("web1", "nginx")),
            Operation::Stop,
        ),
        (
            ResourceDescriptor::Container(ContainerRef::new("abc123", "docker")),
            Operation::Create,
        ),
        (ResourceDescriptor::Application("blog".into()), Operation::Recreate),
    ] {
        let kind = descriptor.kind();
        match reconciler.reconcile(descriptor, operation).await {
            Err(StationError::UnsupportedOperation {
                kind: reported,
                operation: name,
            }) => {
                assert_eq!(reported, kind);
                assert_eq!(name, operation.as_str());
            }
            other => panic!("expected UnsupportedOperation, got {:?}", other),
        }
    }

    assert!(station.submissions().is_empty());
}

#[tokio::test]
async fn test_reconcile_delete_volume_report() {
    let station = FakeStation::new().with_task_states(&["completed"]);
    let operation = Operation::Delete {
        remove_volumes: false,
    };

    let result = station
        .reconciler(fast_policy())
        .reconcile(ResourceDescriptor::Volume("v1".into()), operation)
        .await;
    let report = ReconciliationReport::from_result(ResourceKind::Volume, operation, result);

    assert!(report.success);
    assert_eq!(report.operation, "delete");
    assert!(report.failure_reason.is_none());
}

#[tokio::test]
async fn test_snapshots_are_independent() {
    let station = FakeStation::new()
        .with_overview(overview_with_container("abc123", "web1", "running"))
        .with_overview(overview_with_container("abc123", "web1", "stopped"));
    let reconciler = station.reconciler(fast_policy());

    let (first, second) = tokio::join!(reconciler.snapshot(), reconciler.snapshot());
    let mut first = first.unwrap();
    let second = second.unwrap();

    first.containers.clear();
    assert_eq!(second.containers.len(), 1);
    assert_eq!(station.overview_calls(), 2);
}
