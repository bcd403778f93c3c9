use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bridge_artifacts::{spawn_periodic_sweeper, SweeperHandle, TempArtifactManager};
use bridge_exec::{Completion, ExecutorPool, PoolConfig};
use bridge_parse::{build_parser, ParsedEvent, ParsedResult, DEFAULT_MAX_LINE_BYTES};
use bridge_registry::{CommandRegistry, CommandSpec, RetryableCategory};
use bridge_resilience::{redact_arguments, AuditRecord, AuditSink, CircuitBreaker, ResilienceLayer, RetryPolicy};
use bridge_stream::{BackpressurePolicy, EventFrame, StreamManager, StreamManagerConfig, Subscriber};
use bridge_validate::{validate, CancellationScope, ExecutionStatus, Invocation, Principal, RawRequest};

use crate::collaborators::{AuthProvider, CliBinaryLocator};
use crate::config::BridgeConfig;
use crate::context::RequestContext;
use crate::error::BridgeError;

/// Outcome of a synchronous or newly-admitted asynchronous invocation (§5
/// "Synchronous commands ... HTTP 200 ... Async commands ... HTTP 202").
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub invocation_id: Uuid,
    pub is_async: bool,
    pub data: Option<serde_json::Value>,
}

/// Composes the Command Registry, Input Validator, Temp Artifact Manager,
/// Executor Pool, Output Parser, Stream Manager, and Resilience Layer behind
/// one constructed struct (§9 "No shared mutable singletons" — everything
/// that must be process-wide is reached through `self`, never a global).
pub struct BridgeService {
    config: BridgeConfig,
    registry: CommandRegistry,
    artifacts: Arc<TempArtifactManager>,
    pool: ExecutorPool,
    streams: StreamManager,
    resilience: ResilienceLayer,
    retry: RetryPolicy,
    auth: Arc<dyn AuthProvider>,
    audit: Arc<dyn AuditSink>,
    sweeper: Mutex<Option<SweeperHandle>>,
    /// Invocation id -> cancellation handle for every execution currently
    /// in flight, so an out-of-band `cancel()` (or `shutdown()`) can reach a
    /// subprocess it never directly holds a reference to (§5, §9).
    live_invocations: DashMap<Uuid, CancellationScope>,
}

impl BridgeService {
    /// Loads the command catalog, opens the temp artifact root, and
    /// constructs every collaborator. Does not yet start the background
    /// sweeper — call [`Self::start`] for that.
    pub async fn build(
        config: BridgeConfig,
        cli_binary_locator: Arc<dyn CliBinaryLocator>,
        auth: Arc<dyn AuthProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, BridgeError> {
        let registry = match &config.catalog_overlay {
            Some(path) => CommandRegistry::load_with_overlay(path)?,
            None => CommandRegistry::load()?,
        };

        let cli_binary = cli_binary_locator.locate()?;
        let artifacts = Arc::new(TempArtifactManager::new(config.temp_root.clone()).await?);

        let mut pool_config = PoolConfig::new(cli_binary, config.temp_root.clone());
        pool_config.total_slots = config.pool_size;
        pool_config.max_output_bytes = config.max_output_bytes;
        let pool = ExecutorPool::new(pool_config, artifacts.clone());

        let streams = StreamManager::new(StreamManagerConfig {
            ring_capacity: config.stream_ring_capacity,
            finish_grace: config.stream_finish_grace,
        });

        Ok(Self {
            config,
            registry,
            artifacts,
            pool,
            streams,
            resilience: ResilienceLayer::new(),
            retry: RetryPolicy::default(),
            auth,
            audit,
            sweeper: Mutex::new(None),
            live_invocations: DashMap::new(),
        })
    }

    /// Starts the background artifact sweeper (spec §5 "Process-wide state
    /// and lifecycle"). Idempotent: calling it twice just replaces the
    /// previous sweeper handle.
    pub async fn start(&self) {
        let handle = spawn_periodic_sweeper(
            self.config.temp_root.clone(),
            self.config.artifact_max_age,
            Duration::from_secs(300),
        );
        *self.sweeper.lock().await = Some(handle);
        info!(pool_size = self.config.pool_size, "bridge service started");
    }

    /// Stops admitting new work conceptually (callers are expected to stop
    /// routing requests here once this returns), broadcasts cancellation to
    /// every invocation still in flight, disconnects every stream
    /// subscriber, stops the sweeper (waiting up to `deadline` for its
    /// in-flight pass to settle), and removes the temp artifact root so no
    /// orphaned file outlives the process.
    pub async fn shutdown(&self, deadline: Duration) {
        for entry in self.live_invocations.iter() {
            entry.value().cancel();
        }
        self.streams.shutdown();
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            if tokio::time::timeout(deadline, sweeper.stop()).await.is_err() {
                warn!("sweeper did not stop within the shutdown grace period");
            }
        }
        self.artifacts.remove_root().await;
        info!("bridge service shut down");
    }

    /// Entry point for an inbound request: verifies the principal, then runs
    /// it through [`Self::submit`] (§2's control/data flow, steps 1-2).
    pub async fn handle_request(
        &self,
        command_name: &str,
        raw: &RawRequest,
    ) -> Result<SubmitOutcome, BridgeError> {
        let principal = self.auth.verify(raw).await?;
        let ctx = RequestContext::new(principal);
        self.submit(command_name, raw, &ctx).await
    }

    /// Runs one already-authenticated request through registry lookup,
    /// validation, resilience admission, execution, parsing, and stream
    /// publication (§2's control/data flow, steps 3 onward). `ctx` is
    /// threaded through every layer explicitly rather than read from an
    /// ambient source (§9).
    #[instrument(skip(self, raw, ctx), fields(command = %command_name, principal = %ctx.principal.id, trace_id = %ctx.trace_id))]
    pub async fn submit(
        &self,
        command_name: &str,
        raw: &RawRequest,
        ctx: &RequestContext,
    ) -> Result<SubmitOutcome, BridgeError> {
        let invocation = validate(&self.registry, command_name, raw, &ctx.principal)?;
        let spec = self.registry.lookup(command_name)?;

        if !has_required_capabilities(spec, &ctx.principal) {
            return Err(BridgeError::Forbidden);
        }

        let breaker = self.resilience.admit(spec, &ctx.principal.id)?;
        let started_at = chrono::Utc::now();
        let stream = self.streams.register(invocation.id);
        self.live_invocations
            .insert(invocation.id, invocation.cancellation.clone());

        let deadline = invocation.deadline;
        let attempt_result = self
            .retry
            .run(
                deadline,
                &spec.retryable_categories,
                retry_category,
                || self.run_once(spec, &invocation, &breaker),
            )
            .await;

        self.live_invocations.remove(&invocation.id);

        let (complete_event, exit_code, outcome) = match attempt_result {
            Ok((parsed, completion)) => {
                let event = ParsedEvent::Complete {
                    success: true,
                    exit_code: completion.exit_code,
                    structured_result: parsed.data.clone(),
                };
                (
                    event,
                    completion.exit_code,
                    Ok(SubmitOutcome {
                        invocation_id: stream.id,
                        is_async: spec.is_async,
                        data: parsed.data,
                    }),
                )
            }
            Err(err) => {
                let exit_code = match &err {
                    BridgeError::GeneralError { exit_code, .. } => *exit_code,
                    _ => None,
                };
                let event = ParsedEvent::Complete {
                    success: false,
                    exit_code,
                    structured_result: None,
                };
                (event, exit_code, Err(err))
            }
        };

        if let Err(err) = self.streams.finish(invocation.id, complete_event) {
            warn!(%err, invocation_id = %invocation.id, "failed to finish stream");
        }

        self.emit_audit(
            spec,
            &invocation,
            &ctx.principal,
            started_at,
            exit_code,
            outcome.is_ok(),
            outcome.as_ref().err(),
        )
        .await;

        outcome
    }

    /// Runs `spec` against `invocation` once: admits it to the executor
    /// pool, drives the output parser (publishing events live for streaming
    /// commands), waits for the process to exit, and classifies the result.
    /// Called repeatedly by [`RetryPolicy::run`] for retryable failures.
    async fn run_once(
        &self,
        spec: &CommandSpec,
        invocation: &Invocation,
        breaker: &CircuitBreaker,
    ) -> Result<(ParsedResult, Completion), BridgeError> {
        let mut handle = match self.pool.submit(spec, invocation.clone()).await {
            Ok(handle) => handle,
            Err(err) => {
                breaker.record_failure();
                return Err(err.into());
            }
        };

        let mut parser = build_parser(spec);
        let (stdout_rx, stderr_rx) = handle.io_mut();

        let parsed: ParsedResult = if spec.is_streaming {
            let (events_tx, mut events_rx) = tokio::sync::mpsc::channel::<ParsedEvent>(256);
            let drive_fut = bridge_parse::drive(
                stdout_rx,
                stderr_rx,
                &mut parser,
                DEFAULT_MAX_LINE_BYTES,
                Some(events_tx),
            );
            let publish_fut = async {
                while let Some(event) = events_rx.recv().await {
                    if let Err(err) = self.streams.publish(invocation.id, event) {
                        warn!(%err, invocation_id = %invocation.id, "failed to publish a parsed event");
                    }
                }
            };
            let (parsed, ()) = tokio::join!(drive_fut, publish_fut);
            parsed
        } else {
            bridge_parse::drive(stdout_rx, stderr_rx, &mut parser, DEFAULT_MAX_LINE_BYTES, None).await
        };

        let completion = handle.wait().await;
        let success = completion.status == ExecutionStatus::Completed && parsed.error.is_none();

        if success {
            breaker.record_success();
            Ok((parsed, completion))
        } else {
            breaker.record_failure();
            Err(classify_failure(&completion, &parsed))
        }
    }

    /// Requests prompt cancellation of `invocation_id`'s executing process,
    /// if it is still running. Already-buffered events remain deliverable.
    pub fn cancel(&self, invocation_id: Uuid) {
        if let Some(entry) = self.live_invocations.get(&invocation_id) {
            entry.value().cancel();
        }
    }

    /// Attaches a new subscriber to an in-flight or recently finished
    /// stream, returning it along with its replay backlog (§4.6).
    pub fn subscribe(
        &self,
        stream_id: Uuid,
        principal_id: impl Into<String>,
        queue_capacity: usize,
        policy: BackpressurePolicy,
    ) -> Result<(Arc<Subscriber>, Vec<EventFrame>), BridgeError> {
        Ok(self.streams.subscribe(stream_id, principal_id, queue_capacity, policy)?)
    }

    pub fn unsubscribe(&self, stream_id: Uuid, subscriber_id: Uuid) {
        self.streams.unsubscribe(stream_id, subscriber_id);
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn emit_audit(
        &self,
        spec: &CommandSpec,
        invocation: &bridge_validate::Invocation,
        principal: &Principal,
        started_at: chrono::DateTime<chrono::Utc>,
        exit_code: Option<i32>,
        success: bool,
        error: Option<&BridgeError>,
    ) {
        let record = AuditRecord {
            invocation_id: invocation.id,
            principal_id: principal.id.clone(),
            command_name: spec.name.clone(),
            arguments: redact_arguments(spec, &invocation.arguments),
            started_at,
            ended_at: chrono::Utc::now(),
            exit_code,
            success,
            error_category: error.map(|err| err.code().to_string()),
            origin_ip: None,
            user_agent: None,
        };
        self.audit.record(record).await;
    }
}

fn has_required_capabilities(spec: &CommandSpec, principal: &Principal) -> bool {
    spec.required_capabilities
        .iter()
        .all(|capability| principal.claims.contains_key(capability))
}

fn classify_failure(completion: &Completion, parsed: &ParsedResult) -> BridgeError {
    match completion.status {
        ExecutionStatus::TimedOut => BridgeError::Timeout,
        ExecutionStatus::Cancelled => BridgeError::Cancelled,
        _ => match &parsed.error {
            Some(ParsedEvent::Error { category, message, .. }) if category.eq_ignore_ascii_case("conflict") => {
                let _ = message;
                BridgeError::Conflict
            }
            Some(ParsedEvent::Error { message, .. }) => BridgeError::GeneralError {
                exit_code: completion.exit_code,
                stderr_tail: message.clone(),
            },
            _ => BridgeError::GeneralError {
                exit_code: completion.exit_code,
                stderr_tail: "command exited with a non-zero status".to_string(),
            },
        },
    }
}

/// Maps a failed attempt to the [`RetryableCategory`] it belongs to, if any.
/// `exit_code: None` covers both a spawn-time [`ExecError`] and a process
/// killed before it could exit on its own, both of which look like a
/// transient I/O failure from the CLI binary rather than the command
/// itself rejecting the request (§4.7). Anything else that isn't a plain
/// non-zero exit (forbidden, timeout, cancelled, conflict, ...) is never
/// retried regardless of what the command's spec allows.
///
/// [`ExecError`]: bridge_exec::ExecError
fn retry_category(err: &BridgeError) -> Option<RetryableCategory> {
    match err {
        BridgeError::PoolSaturated => Some(RetryableCategory::TransientIo),
        BridgeError::GeneralError { exit_code: None, .. } => Some(RetryableCategory::TransientIo),
        BridgeError::GeneralError { .. } => Some(RetryableCategory::GeneralError),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FixedCliBinaryLocator, StaticAuthProvider};
    use bridge_resilience::InMemoryAuditSink;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_fake_cli(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("fake-cli");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(script.as_bytes()).unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    async fn service(dir: &std::path::Path, script: &str) -> BridgeService {
        let binary = write_fake_cli(dir, script);
        let config = BridgeConfig::new(binary.clone(), dir.join("artifacts"));
        BridgeService::build(
            config,
            Arc::new(FixedCliBinaryLocator::new(binary)),
            Arc::new(StaticAuthProvider::new().with_token("tok-1", Principal::new("user-1"))),
            Arc::new(InMemoryAuditSink::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn synchronous_version_command_returns_raw_output() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "#!/bin/sh\necho 'cli-bridge 1.0'\n").await;
        let ctx = RequestContext::new(Principal::new("user-1"));
        let raw = RawRequest::new();
        let outcome = svc.submit("version", &raw, &ctx).await.unwrap();
        assert_eq!(
            outcome.data,
            Some(serde_json::Value::String("cli-bridge 1.0".to_string()))
        );
        assert!(!outcome.is_async);
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_as_general_error_and_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "#!/bin/sh\necho boom 1>&2\nexit 1\n").await;
        let ctx = RequestContext::new(Principal::new("user-1"));
        let raw = RawRequest::new();
        let err = svc.submit("version", &raw, &ctx).await.unwrap_err();
        assert!(matches!(err, BridgeError::GeneralError { .. }));
    }

    #[tokio::test]
    async fn missing_required_argument_never_reaches_the_executor() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "#!/bin/sh\nexit 0\n").await;
        let ctx = RequestContext::new(Principal::new("user-1"));
        let raw = RawRequest::new();
        let err = svc.submit("server.inspect", &raw, &ctx).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn handle_request_rejects_an_unverified_principal() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "#!/bin/sh\nexit 0\n").await;
        let raw = RawRequest::new();
        let err = svc.handle_request("version", &raw).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unauthenticated));
    }

    #[tokio::test]
    async fn cancel_stops_a_running_invocation_and_is_a_noop_for_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(service(dir.path(), "#!/bin/sh\nsleep 5\n").await);

        svc.cancel(Uuid::new_v4());

        let ctx = RequestContext::new(Principal::new("user-1"));
        let raw = RawRequest::new();
        let submit_svc = svc.clone();
        let submit = tokio::spawn(async move { submit_svc.submit("version", &raw, &ctx).await });

        let invocation_id = loop {
            if let Some(entry) = svc.live_invocations.iter().next() {
                break *entry.key();
            }
            tokio::task::yield_now().await;
        };
        svc.cancel(invocation_id);

        let err = submit.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
    }

    #[tokio::test]
    async fn shutdown_removes_the_temp_artifact_root() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "#!/bin/sh\nexit 0\n").await;
        let root = dir.path().join("artifacts");
        assert!(root.exists());

        svc.shutdown(Duration::from_secs(1)).await;
        assert!(!root.exists());
    }
}
