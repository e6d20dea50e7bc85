//! Test support utilities shared across unit and integration tests.

use std::collections::{HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::sleep;
use tracing::Level;
use tracing::subscriber::DefaultGuard;

use crate::compute::{ComputeApi, ComputeError, ComputeFuture, Operation, OperationStatus, Page};
use crate::filter::{Decision, DecisionSink, Stage};
use crate::resource::{Resource, Scope};

/// Records a single call made through [`ScriptedCompute`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComputeCall {
    /// `list_images` with the page token passed.
    ListImages {
        /// Page token.
        page_token: Option<String>,
    },
    /// `list_zones` with the page token passed.
    ListZones {
        /// Page token.
        page_token: Option<String>,
    },
    /// `list_instances` for a zone.
    ListInstances {
        /// Zone listed.
        zone: String,
        /// Page token.
        page_token: Option<String>,
    },
    /// `delete_image`.
    DeleteImage {
        /// Image name.
        name: String,
    },
    /// `delete_instance`.
    DeleteInstance {
        /// Zone of the instance.
        zone: String,
        /// Instance name.
        name: String,
    },
    /// Any of the operation getters.
    GetOperation {
        /// Endpoint queried, rendered like a [`Scope`].
        endpoint: String,
        /// Operation id.
        id: String,
    },
}

#[derive(Debug, Default)]
struct ScriptState {
    image_pages: VecDeque<Result<Page<Resource>, ComputeError>>,
    zone_pages: VecDeque<Result<Page<String>, ComputeError>>,
    instance_pages: HashMap<String, VecDeque<Result<Page<Resource>, ComputeError>>>,
    deletes: HashMap<String, Result<Operation, ComputeError>>,
    operations: HashMap<String, VecDeque<Result<Operation, ComputeError>>>,
    calls: Vec<ComputeCall>,
}

/// Scripted [`ComputeApi`] returning pre-seeded responses.
///
/// List calls pop pages in FIFO order. Delete responses are keyed by
/// resource name. Operation responses are keyed by operation id and the last
/// queued response repeats, so a single `RUNNING` entry models an operation
/// that never finishes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCompute {
    state: Arc<Mutex<ScriptState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    poll_latency: Duration,
}

impl ScriptedCompute {
    /// Creates a fake with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every operation poll by `latency`.
    #[must_use]
    pub fn with_poll_latency(mut self, latency: Duration) -> Self {
        self.poll_latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an image listing page.
    pub fn push_image_page(&self, page: Result<Page<Resource>, ComputeError>) {
        self.state().image_pages.push_back(page);
    }

    /// Queues a zone listing page.
    pub fn push_zone_page(&self, page: Result<Page<String>, ComputeError>) {
        self.state().zone_pages.push_back(page);
    }

    /// Queues an instance listing page for `zone`.
    pub fn push_instance_page(&self, zone: &str, page: Result<Page<Resource>, ComputeError>) {
        self.state()
            .instance_pages
            .entry(zone.to_owned())
            .or_default()
            .push_back(page);
    }

    /// Sets the response to a delete of the resource called `name`.
    pub fn on_delete(&self, name: &str, response: Result<Operation, ComputeError>) {
        self.state().deletes.insert(name.to_owned(), response);
    }

    /// Queues a status response for operation `id`.
    pub fn push_operation(&self, id: &str, response: Result<Operation, ComputeError>) {
        self.state()
            .operations
            .entry(id.to_owned())
            .or_default()
            .push_back(response);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.state().calls.clone()
    }

    /// Returns how many operations were in flight at the busiest moment.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: ComputeCall) {
        self.state().calls.push(call);
    }

    fn track_started(&self, operation: &Operation) {
        if operation.status.is_terminal() {
            return;
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn track_observed(&self, operation: &Operation) {
        if operation.status.is_terminal() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn delete_response(&self, name: &str) -> Result<Operation, ComputeError> {
        let response = self
            .state()
            .deletes
            .remove(name)
            .unwrap_or_else(|| Err(missing_response(&format!("delete {name}"))));
        if let Ok(operation) = &response {
            self.track_started(operation);
        }
        response
    }

    async fn operation_response(
        &self,
        endpoint: String,
        id: &str,
    ) -> Result<Operation, ComputeError> {
        self.record(ComputeCall::GetOperation {
            endpoint,
            id: id.to_owned(),
        });
        if !self.poll_latency.is_zero() {
            sleep(self.poll_latency).await;
        }
        let response = {
            let mut state = self.state();
            match state.operations.get_mut(id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        }
        .unwrap_or_else(|| Err(missing_response(&format!("operation {id}"))));
        if let Ok(operation) = &response {
            self.track_observed(operation);
        }
        response
    }
}

fn missing_response(what: &str) -> ComputeError {
    ComputeError::Transport {
        url: format!("scripted://{what}"),
        message: String::from("no scripted response available"),
    }
}

impl ComputeApi for ScriptedCompute {
    fn list_images<'a>(
        &'a self,
        _project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>> {
        Box::pin(async move {
            self.record(ComputeCall::ListImages {
                page_token: page_token.map(str::to_owned),
            });
            self.state()
                .image_pages
                .pop_front()
                .unwrap_or_else(|| Err(missing_response("images")))
        })
    }

    fn list_zones<'a>(
        &'a self,
        _project: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<String>> {
        Box::pin(async move {
            self.record(ComputeCall::ListZones {
                page_token: page_token.map(str::to_owned),
            });
            self.state()
                .zone_pages
                .pop_front()
                .unwrap_or_else(|| Err(missing_response("zones")))
        })
    }

    fn list_instances<'a>(
        &'a self,
        _project: &'a str,
        zone: &'a str,
        page_token: Option<&'a str>,
    ) -> ComputeFuture<'a, Page<Resource>> {
        Box::pin(async move {
            self.record(ComputeCall::ListInstances {
                zone: zone.to_owned(),
                page_token: page_token.map(str::to_owned),
            });
            self.state()
                .instance_pages
                .get_mut(zone)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(missing_response(&format!("instances in {zone}"))))
        })
    }

    fn delete_image<'a>(
        &'a self,
        _project: &'a str,
        name: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            self.record(ComputeCall::DeleteImage {
                name: name.to_owned(),
            });
            self.delete_response(name)
        })
    }

    fn delete_instance<'a>(
        &'a self,
        _project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(async move {
            self.record(ComputeCall::DeleteInstance {
                zone: zone.to_owned(),
                name: name.to_owned(),
            });
            self.delete_response(name)
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        _project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(self.operation_response(format!("zone:{zone}"), operation))
    }

    fn get_region_operation<'a>(
        &'a self,
        _project: &'a str,
        region: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(self.operation_response(format!("region:{region}"), operation))
    }

    fn get_global_operation<'a>(
        &'a self,
        _project: &'a str,
        operation: &'a str,
    ) -> ComputeFuture<'a, Operation> {
        Box::pin(self.operation_response(String::from("global"), operation))
    }
}

/// Builds an operation snapshot for scripting.
#[must_use]
pub fn operation(id: &str, status: OperationStatus, scope: Scope) -> Operation {
    let error =
        (status == OperationStatus::Failed).then(|| String::from("QUOTA_EXCEEDED: simulated"));
    Operation {
        id: id.to_owned(),
        target_link: format!("projects/test/targets/{id}"),
        status,
        scope,
        start_time: Some(String::from("2024-01-01T00:00:00Z")),
        error,
    }
}

/// Decision sink that keeps every record in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    decisions: Arc<Mutex<Vec<Decision>>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every decision recorded so far.
    #[must_use]
    pub fn decisions(&self) -> Vec<Decision> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns decisions recorded by `stage`.
    #[must_use]
    pub fn for_stage(&self, stage: Stage) -> Vec<Decision> {
        self.decisions()
            .into_iter()
            .filter(|decision| decision.stage == stage)
            .collect()
    }
}

impl DecisionSink for RecordingSink {
    fn record(&self, decision: &Decision) {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
    }
}

/// In-memory log sink for asserting on emitted `tracing` events.
///
/// [`LogCapture::install`] sets a thread-local default subscriber, so it
/// sees events from tasks polled on the test's current-thread runtime.
#[derive(Clone, Debug, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every event, at any level, into this capture until the
    /// returned guard is dropped.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Returns everything logged so far.
    #[must_use]
    pub fn contents(&self) -> String {
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
