//! Test doubles for the orchestration core
//!
//! `SimulatedClock` advances instantly on `sleep`, and `ScriptedDriver`
//! answers page checks from per-prompt scripts evaluated against that clock, so
//! whole batches replay in microseconds.

use async_trait::async_trait;
use scenecast_core::domain::job::{ArtifactRef, SessionId};
use scenecast_core::{AuthError, Authenticator, DriverError, UiDriver, UiProbe};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::service::ArtifactStore;

#[derive(Debug, Clone)]
pub struct SimulatedClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Virtual time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Behavior of the application for one prompt
#[derive(Debug, Clone, Default)]
pub struct PromptScript {
    /// Artifact appears this long after the latest submission
    pub artifact_after: Option<Duration>,
    pub fatal: bool,
    pub action_prompt: bool,
    pub submit_fails: bool,
    pub checks_fail: bool,
}

impl PromptScript {
    pub fn succeeds_after(secs: u64) -> Self {
        Self {
            artifact_after: Some(Duration::from_secs(secs)),
            ..Self::default()
        }
    }

    pub fn never() -> Self {
        Self::default()
    }

    pub fn banned() -> Self {
        Self {
            fatal: true,
            ..Self::default()
        }
    }

    pub fn with_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_action_prompt(mut self) -> Self {
        self.action_prompt = true;
        self
    }

    pub fn with_failing_submit(mut self) -> Self {
        self.submit_fails = true;
        self
    }

    pub fn with_failing_checks(mut self) -> Self {
        self.checks_fail = true;
        self
    }
}

#[derive(Debug)]
struct Submission {
    prompt: String,
    at: Instant,
}

#[derive(Debug, Default)]
struct DriverState {
    next_session: usize,
    open: HashSet<SessionId>,
    closed: Vec<SessionId>,
    submissions: HashMap<SessionId, Submission>,
    submit_log: Vec<(SessionId, String)>,
    acknowledged: HashSet<SessionId>,
    navigations: usize,
    acknowledgements: usize,
    auth_calls: usize,
}

/// Scripted stand-in for the browser, page checks and login flow
pub struct ScriptedDriver {
    clock: SimulatedClock,
    scripts: HashMap<String, PromptScript>,
    fail_open_after: Option<usize>,
    fail_close: bool,
    fail_auth: bool,
    submit_duration: Duration,
    state: Mutex<DriverState>,
}

impl ScriptedDriver {
    pub fn new(clock: SimulatedClock) -> Self {
        Self {
            clock,
            scripts: HashMap::new(),
            fail_open_after: None,
            fail_close: false,
            fail_auth: false,
            submit_duration: Duration::ZERO,
            state: Mutex::new(DriverState::default()),
        }
    }

    pub fn script(mut self, prompt: &str, script: PromptScript) -> Self {
        self.scripts.insert(prompt.to_string(), script);
        self
    }

    /// Opening succeeds `n` times, then fails
    pub fn fail_open_after(mut self, n: usize) -> Self {
        self.fail_open_after = Some(n);
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn fail_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    /// Every submission takes `duration` of simulated time
    pub fn slow_submit(mut self, duration: Duration) -> Self {
        self.submit_duration = duration;
        self
    }

    /// Sessions closed successfully, in order
    pub fn closed(&self) -> Vec<SessionId> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().next_session
    }

    /// Every submission attempt as `(session, prompt)`
    pub fn submissions(&self) -> Vec<(SessionId, String)> {
        self.state.lock().unwrap().submit_log.clone()
    }

    pub fn submissions_of(&self, prompt: &str) -> usize {
        self.submissions().iter().filter(|(_, p)| p == prompt).count()
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().unwrap().navigations
    }

    pub fn acknowledgements(&self) -> usize {
        self.state.lock().unwrap().acknowledgements
    }

    pub fn auth_calls(&self) -> usize {
        self.state.lock().unwrap().auth_calls
    }

    /// Script and submission time of the prompt last sent on `session`
    fn current(&self, session: &SessionId) -> Option<(String, PromptScript, Instant)> {
        let state = self.state.lock().unwrap();
        let submission = state.submissions.get(session)?;
        let script = self.scripts.get(&submission.prompt).cloned().unwrap_or_default();
        Some((submission.prompt.clone(), script, submission.at))
    }

    fn ensure_open(&self, session: &SessionId) -> Result<(), DriverError> {
        if self.state.lock().unwrap().open.contains(session) {
            Ok(())
        } else {
            Err(DriverError::SessionNotFound(session.to_string()))
        }
    }
}

#[async_trait]
impl UiDriver for ScriptedDriver {
    async fn open_session(&self) -> Result<SessionId, DriverError> {
        let mut state = self.state.lock().unwrap();
        if self.fail_open_after.is_some_and(|n| state.next_session >= n) {
            return Err(DriverError::protocol("session not created", "tab limit reached"));
        }
        state.next_session += 1;
        let session = SessionId::new(format!("tab-{}", state.next_session));
        state.open.insert(session.clone());
        Ok(session)
    }

    async fn close_session(&self, session: &SessionId) -> Result<(), DriverError> {
        if self.fail_close {
            return Err(DriverError::Transport("connection reset".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.open.remove(session);
        state.closed.push(session.clone());
        Ok(())
    }

    async fn navigate_home(&self, session: &SessionId) -> Result<(), DriverError> {
        self.ensure_open(session)?;
        self.state.lock().unwrap().navigations += 1;
        Ok(())
    }

    async fn submit_prompt(&self, session: &SessionId, prompt: &str) -> Result<(), DriverError> {
        self.ensure_open(session)?;
        self.clock.advance(self.submit_duration);
        let mut state = self.state.lock().unwrap();
        state.submit_log.push((session.clone(), prompt.to_string()));
        state.acknowledged.remove(session);
        state.submissions.insert(
            session.clone(),
            Submission {
                prompt: prompt.to_string(),
                at: self.clock.now(),
            },
        );

        let fails = self.scripts.get(prompt).is_some_and(|s| s.submit_fails);
        if fails {
            return Err(DriverError::Script("send button not found".to_string()));
        }
        Ok(())
    }

    async fn acknowledge_action_prompt(&self, session: &SessionId) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.acknowledgements += 1;
        state.acknowledged.insert(session.clone());
        Ok(())
    }

    async fn download_artifact(
        &self,
        _session: &SessionId,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, DriverError> {
        Ok(format!("video:{}", artifact.locator).into_bytes())
    }
}

#[async_trait]
impl UiProbe for ScriptedDriver {
    async fn find_artifact(&self, session: &SessionId) -> Result<Option<ArtifactRef>, DriverError> {
        let Some((prompt, script, submitted_at)) = self.current(session) else {
            return Ok(None);
        };
        if script.checks_fail {
            return Err(DriverError::Script("page check crashed".to_string()));
        }

        let ready = script
            .artifact_after
            .is_some_and(|after| self.clock.now() >= submitted_at + after);
        Ok(ready.then(|| ArtifactRef::new(format!("blob:test/{}", prompt))))
    }

    async fn detect_fatal_marker(&self, session: &SessionId) -> Result<bool, DriverError> {
        Ok(self.current(session).is_some_and(|(_, script, _)| script.fatal))
    }

    async fn detect_action_prompt(&self, session: &SessionId) -> Result<bool, DriverError> {
        let acknowledged = self.state.lock().unwrap().acknowledged.contains(session);
        Ok(!acknowledged && self.current(session).is_some_and(|(_, script, _)| script.action_prompt))
    }
}

#[async_trait]
impl Authenticator for ScriptedDriver {
    async fn ensure_authenticated(&self, primary: &SessionId) -> Result<(), AuthError> {
        self.ensure_open(primary)?;
        self.state.lock().unwrap().auth_calls += 1;
        if self.fail_auth {
            return Err(AuthError::AttemptsExhausted(10));
        }
        Ok(())
    }
}

/// Store keeping artifacts in memory
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(u64, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn saved_ids(&self) -> Vec<u64> {
        self.saved.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save(&self, job_id: u64, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        self.saved.lock().unwrap().push((job_id, bytes.to_vec()));
        Ok(PathBuf::from(format!("memory/scene_{}.mp4", job_id)))
    }
}
