use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::config::{AppConfig, RetryConfig};
use crate::error::LoadError;
use crate::model::handle::{ModelHandle, load_torch_model};

/// Where the model currently is in its life.
pub enum LifecycleState {
    Unloaded,
    Loading,
    Ready(Arc<ModelHandle>),
    Failed { reason: String, attempts: u32 },
}

impl LifecycleState {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Unloaded => "unloaded",
            LifecycleState::Loading => "loading",
            LifecycleState::Ready(_) => "ready",
            LifecycleState::Failed { .. } => "failed",
        }
    }
}

type Loader = Box<dyn Fn() -> Result<ModelHandle, LoadError> + Send + Sync>;

/// Owns the process-wide model state.
///
/// The state mutex only guards transitions; the load-and-self-test
/// sequence itself (and its backoff sleeps) runs with the lock released,
/// so `state_label` and `is_ready` answer at any instant, including while
/// a load is in flight. Exactly one thread runs a load at a time: callers
/// arriving during `Loading` wait on a condvar until the result is
/// published. Once `Ready`, the state only changes through an explicit
/// `reload`.
pub struct LifecycleManager {
    state: Mutex<LifecycleState>,
    loaded: Condvar,
    loader: Loader,
    retry: RetryConfig,
    load_attempts: AtomicU32,
}

/// Publishes a terminal `Failed` state if the loader panics, so waiters
/// are woken instead of waiting on a load that will never finish.
struct LoadInFlight<'a> {
    manager: &'a LifecycleManager,
}

impl Drop for LoadInFlight<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.manager.lock_state();
            *state = LifecycleState::Failed {
                reason: "model loader panicked".to_string(),
                attempts: self.manager.retry.max_attempts,
            };
            self.manager.loaded.notify_all();
        }
    }
}

impl LifecycleManager {
    /// Production manager: loads the TorchScript artifact named by the
    /// deployment config. Policies without retry semantics get a single
    /// attempt.
    pub fn new(config: &AppConfig, num_classes: usize) -> Self {
        let mut retry = config.retry.clone();
        if !matches!(
            config.load_policy,
            crate::config::LoadPolicy::Retrying | crate::config::LoadPolicy::Degraded
        ) {
            retry.max_attempts = 1;
        }
        let loader_config = config.clone();
        Self::with_loader(
            retry,
            Box::new(move || load_torch_model(&loader_config, num_classes)),
        )
    }

    /// Manager with an injected loader; how the tests run lifecycle
    /// scenarios without a model artifact.
    pub fn with_loader(retry: RetryConfig, loader: Loader) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Unloaded),
            loaded: Condvar::new(),
            loader,
            retry,
            load_attempts: AtomicU32::new(0),
        }
    }

    /// A panicked thread can only have poisoned the mutex during a state
    /// transition, and every transition writes a whole new value, so the
    /// stored state is coherent; carry on rather than panicking every
    /// later request.
    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the ready model, loading it first if necessary.
    ///
    /// Callers arriving while another thread is loading wait for that
    /// thread's result rather than starting a second attempt. After
    /// retries are exhausted every subsequent call fails immediately
    /// without another attempt, until `reload` is called.
    pub fn ensure_ready(&self) -> Result<Arc<ModelHandle>, LoadError> {
        let mut state = self.lock_state();
        loop {
            match &*state {
                LifecycleState::Ready(handle) => return Ok(handle.clone()),
                LifecycleState::Failed { reason, attempts }
                    if *attempts >= self.retry.max_attempts =>
                {
                    return Err(LoadError::Exhausted {
                        reason: reason.clone(),
                        attempts: *attempts,
                    });
                }
                LifecycleState::Loading => {
                    state = self
                        .loaded
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                LifecycleState::Unloaded | LifecycleState::Failed { .. } => break,
            }
        }

        let prior_attempts = match &*state {
            LifecycleState::Failed { attempts, .. } => *attempts,
            _ => 0,
        };
        *state = LifecycleState::Loading;
        drop(state);

        // Load with the lock released so diagnostics stay responsive.
        let in_flight = LoadInFlight { manager: self };
        let outcome = self.run_attempts(prior_attempts);
        drop(in_flight);

        let mut state = self.lock_state();
        match outcome {
            Ok(handle) => {
                *state = LifecycleState::Ready(handle.clone());
                self.loaded.notify_all();
                Ok(handle)
            }
            Err((reason, attempts)) => {
                *state = LifecycleState::Failed {
                    reason: reason.clone(),
                    attempts,
                };
                self.loaded.notify_all();
                Err(LoadError::Exhausted { reason, attempts })
            }
        }
    }

    /// Runs the remaining attempt budget with backoff between attempts.
    fn run_attempts(&self, mut attempts: u32) -> Result<Arc<ModelHandle>, (String, u32)> {
        let mut last_reason = String::new();
        while attempts < self.retry.max_attempts {
            attempts += 1;
            if attempts > 1 {
                std::thread::sleep(self.retry.delay_before(attempts - 1));
            }
            self.load_attempts.fetch_add(1, Ordering::SeqCst);
            log::info!("Model load attempt {}/{}", attempts, self.retry.max_attempts);
            match (self.loader)() {
                Ok(handle) => return Ok(Arc::new(handle)),
                Err(e) => {
                    log::warn!("Model load attempt {} failed: {}", attempts, e);
                    last_reason = e.to_string();
                }
            }
        }
        Err((last_reason, attempts))
    }

    /// Snapshot of the current state label for diagnostics. Never blocks
    /// on an in-flight load.
    pub fn state_label(&self) -> &'static str {
        self.lock_state().label()
    }

    /// The ready handle, if there is one, without triggering a load.
    pub fn handle(&self) -> Option<Arc<ModelHandle>> {
        match &*self.lock_state() {
            LifecycleState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.handle().is_some()
    }

    /// Explicit reset to `Unloaded`, clearing the attempt budget. The only
    /// way out of a terminal `Ready` or exhausted `Failed` state. An
    /// in-flight load is left to publish its own result.
    pub fn reload(&self) {
        let mut state = self.lock_state();
        if !matches!(&*state, LifecycleState::Loading) {
            *state = LifecycleState::Unloaded;
        }
    }

    /// Total load attempts performed since startup (instrumentation).
    pub fn load_attempt_count(&self) -> u32 {
        self.load_attempts.load(Ordering::SeqCst)
    }
}
