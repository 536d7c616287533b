//! Session management with an FSM-tracked phase and stale-result protection.
//!
//! `SessionManager` owns the in-memory session (user, token, programs,
//! current program, last error) and mirrors it to a [`SessionVault`]. Every
//! network-backed operation runs in three steps: begin (transition the FSM,
//! advance the generation), await the API, commit. A commit only lands if
//! the generation is still the one captured at begin; otherwise the result
//! belongs to an operation that was overtaken (by a newer operation or a
//! logout) and is dropped with [`AuthError::Superseded`].
//!
//! The state lock is never held across an `.await`.

use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionPhase};
use crate::{
    AuthApi, AuthError, AuthResult, Credentials, LoginResponse, ProgramAccess, ProgramSwitch,
    Role, SessionRecord, SignupRequest, SignupResponse, User,
};
use abet_storage::{SessionVault, VaultError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const LOGIN_FAILED: &str = "Login failed";
const SIGNUP_FAILED: &str = "Signup failed";
const SWITCH_FAILED: &str = "Program switch failed";
const REFRESH_FAILED: &str = "Could not refresh user";
const PROGRAMS_FAILED: &str = "Could not load programs";

/// Result of [`SessionManager::load_from_storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// A stored session was loaded.
    Restored,
    /// Nothing usable was stored.
    Empty,
    /// The stored session was unreadable and has been cleared.
    Discarded,
}

/// Payload for session phase change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPhaseChanged {
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Callback type for session phase change notifications.
pub type SessionPhaseCallback = Box<dyn Fn(SessionPhaseChanged) + Send + Sync>;

/// Read-only copy of the session.
///
/// Derived facts (`is_logged_in`, `is_admin`, ...) are computed on every
/// call from the copied fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<User>,
    #[serde(skip)]
    pub auth_token: Option<String>,
    pub programs: Vec<ProgramAccess>,
    pub current_program_id: Option<i64>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some() && self.auth_token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_instructor(&self) -> bool {
        self.has_role(Role::Instructor)
    }

    /// The user's id, or 0 when logged out.
    pub fn user_id(&self) -> i64 {
        self.user.as_ref().map_or(0, |user| user.id)
    }

    /// Display name, or "" when logged out.
    pub fn user_full_name(&self) -> String {
        self.user.as_ref().map(User::full_name).unwrap_or_default()
    }

    fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|user| user.role == role)
    }
}

struct SessionState {
    fsm: SessionMachine,
    user: Option<User>,
    token: Option<String>,
    programs: Vec<ProgramAccess>,
    current_program_id: Option<i64>,
    error: Option<String>,
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            fsm: SessionMachine::new(),
            user: None,
            token: None,
            programs: Vec::new(),
            current_program_id: None,
            error: None,
            generation: 0,
        }
    }

    fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.state())
    }

    fn record(&self) -> Option<SessionRecord> {
        let (Some(token), Some(user)) = (&self.token, &self.user) else {
            return None;
        };
        Some(SessionRecord {
            token: token.clone(),
            user: user.clone(),
            programs: self.programs.clone(),
            current_program_id: self.current_program_id,
            saved_at: None,
        })
    }

    fn apply(&mut self, record: SessionRecord) {
        self.token = Some(record.token);
        self.user = Some(record.user);
        self.programs = record.programs;
        self.current_program_id = record.current_program_id;
    }

    fn clear(&mut self) {
        self.user = None;
        self.token = None;
        self.programs.clear();
        self.current_program_id = None;
        self.error = None;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            user: self.user.clone(),
            auth_token: self.token.clone(),
            programs: self.programs.clone(),
            current_program_id: self.current_program_id,
            error: self.error.clone(),
        }
    }

    /// Transition the FSM, returning the change event if the phase moved.
    fn transition(
        &mut self,
        input: &SessionMachineInput,
    ) -> AuthResult<Option<SessionPhaseChanged>> {
        let old_phase = self.phase();

        self.fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.fsm.state()
            ))
        })?;

        let new_phase = self.phase();
        if old_phase == new_phase {
            return Ok(None);
        }

        debug!(
            old_phase = ?old_phase,
            new_phase = ?new_phase,
            "Session phase transition"
        );

        Ok(Some(SessionPhaseChanged {
            phase: new_phase,
            user_id: self.user.as_ref().map(|user| user.id),
            email: self.user.as_ref().map(|user| user.email.clone()),
        }))
    }

    /// Transition for inputs that are valid in every phase they can arrive
    /// in. A rejection is logged rather than returned.
    fn settle(&mut self, input: &SessionMachineInput) -> Option<SessionPhaseChanged> {
        self.transition(input).unwrap_or_else(|e| {
            warn!(error = %e, "Unexpected session transition");
            None
        })
    }
}

/// The client session.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct SessionManager {
    vault: SessionVault,
    api: Arc<dyn AuthApi>,
    state: Mutex<SessionState>,
    hydrated: AtomicBool,
    state_callback: Mutex<Option<SessionPhaseCallback>>,
}

impl SessionManager {
    /// Create an empty (logged out) session.
    pub fn new(vault: SessionVault, api: Arc<dyn AuthApi>) -> Self {
        Self {
            vault,
            api,
            state: Mutex::new(SessionState::new()),
            hydrated: AtomicBool::new(false),
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of phase changes.
    ///
    /// The callback runs after the session lock is released, so it may read
    /// the session. It must not replace itself.
    pub fn set_state_callback(&self, callback: SessionPhaseCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    fn notify(&self, change: Option<SessionPhaseChanged>) {
        let Some(change) = change else {
            return;
        };
        if let Some(callback) = self.state_callback.lock().as_ref() {
            callback(change);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    pub fn is_logged_in(&self) -> bool {
        self.snapshot().is_logged_in()
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin()
    }

    /// Whether storage holds a session, in either layout. Storage errors
    /// read as `false`.
    pub fn has_stored_session(&self) -> bool {
        self.vault.has_session().unwrap_or_else(|e| {
            warn!(error = %e, "Could not check stored session");
            false
        })
    }

    fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    /// Start an operation: clear the error, move the FSM, advance the
    /// generation. Returns the generation the operation owns.
    fn begin(&self, input: SessionMachineInput) -> AuthResult<u64> {
        let (generation, change) = {
            let mut state = self.state.lock();
            let change = state.transition(&input)?;
            state.error = None;
            state.generation += 1;
            (state.generation, change)
        };
        self.notify(change);
        Ok(generation)
    }

    /// Persist and adopt the record produced by `update`, if `generation` is
    /// still current.
    ///
    /// `update` receives the current record (if any). Storage is written
    /// before memory; a storage failure leaves memory untouched and sets
    /// `error` to `fallback`.
    fn commit<F>(
        &self,
        generation: u64,
        update: F,
        success: Option<SessionMachineInput>,
        failure: Option<SessionMachineInput>,
        fallback: &str,
    ) -> AuthResult<()>
    where
        F: FnOnce(Option<SessionRecord>) -> Option<SessionRecord>,
    {
        let (result, change) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(
                    generation,
                    current = state.generation,
                    "Discarding result of superseded operation"
                );
                return Err(AuthError::Superseded);
            }

            let Some(record) = update(state.record()) else {
                return Err(AuthError::NotLoggedIn);
            };
            let record = record.stamped();

            match self.vault.save(&record) {
                Ok(()) => {
                    state.apply(record);
                    (Ok(()), success.and_then(|input| state.settle(&input)))
                }
                Err(e) => {
                    warn!(error = %e, "Failed to persist session");
                    state.error = Some(fallback.to_string());
                    (
                        Err(AuthError::from(e)),
                        failure.and_then(|input| state.settle(&input)),
                    )
                }
            }
        };
        self.notify(change);
        result
    }

    /// Record a failed operation, if it is still current, and hand the
    /// error back.
    fn fail(
        &self,
        generation: u64,
        error: AuthError,
        input: SessionMachineInput,
        fallback: &str,
    ) -> AuthError {
        let change = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(error = %error, "Ignoring failure of superseded operation");
                return error;
            }
            state.error = Some(error.user_message(fallback));
            state.settle(&input)
        };
        self.notify(change);
        error
    }

    /// Move the FSM for an operation that completed without new session
    /// data.
    fn finish(&self, generation: u64, input: SessionMachineInput) -> AuthResult<()> {
        let change = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return Err(AuthError::Superseded);
            }
            state.settle(&input)
        };
        self.notify(change);
        Ok(())
    }

    /// Drop the session in memory and in storage. Supersedes anything in
    /// flight.
    fn end_session(
        &self,
        state: &mut SessionState,
        input: &SessionMachineInput,
    ) -> Option<SessionPhaseChanged> {
        state.generation += 1;
        state.clear();
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        state.settle(input)
    }

    /// Log in with email and password.
    ///
    /// On success the session is persisted, then adopted, and the server's
    /// payload is returned. On failure `error` holds the server's message
    /// (or "Login failed") and any previous session is kept.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let generation = self.begin(SessionMachineInput::AuthAttempt)?;

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.api.login(&credentials).await {
            Ok(response) => {
                let record = SessionRecord::new(
                    response.token.clone(),
                    response.user.clone(),
                    response.programs.clone(),
                );
                self.commit(
                    generation,
                    |_| Some(record),
                    Some(SessionMachineInput::Authenticated),
                    Some(SessionMachineInput::Rejected),
                    LOGIN_FAILED,
                )?;
                info!(user_id = response.user.id, "Login successful");
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                Err(self.fail(generation, e, SessionMachineInput::Rejected, LOGIN_FAILED))
            }
        }
    }

    /// Register a new account.
    ///
    /// When the server returns a token the new user is logged in exactly as
    /// by [`login`](Self::login). Without a token the session is left as it
    /// was and no error is recorded.
    pub async fn signup(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<SignupResponse> {
        let generation = self.begin(SessionMachineInput::AuthAttempt)?;

        let request = SignupRequest {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match self.api.signup(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Signup failed");
                return Err(self.fail(generation, e, SessionMachineInput::Rejected, SIGNUP_FAILED));
            }
        };

        match &response.token {
            Some(token) => {
                let record = SessionRecord::new(token.clone(), response.user.clone(), Vec::new());
                self.commit(
                    generation,
                    |_| Some(record),
                    Some(SessionMachineInput::Authenticated),
                    Some(SessionMachineInput::Rejected),
                    SIGNUP_FAILED,
                )?;
                info!(user_id = response.user.id, "Signup successful, logged in");
            }
            None => {
                self.finish(generation, SessionMachineInput::SignupPending)?;
                info!(user_id = response.user.id, "Signup successful, login required");
            }
        }

        Ok(response)
    }

    /// Clear the session in memory and in storage.
    ///
    /// Never fails and is idempotent. Anything in flight is superseded.
    pub fn logout(&self) {
        let change = {
            let mut state = self.state.lock();
            self.end_session(&mut state, &SessionMachineInput::LogoutRequested)
        };
        self.notify(change);
        info!("Logged out");
    }

    /// Populate the session from storage.
    ///
    /// An unreadable stored session is cleared as if by [`logout`](Self::logout).
    pub fn load_from_storage(&self) -> RestoreOutcome {
        match self.vault.load::<SessionRecord>() {
            Ok(Some(record)) if !record.token.is_empty() => {
                let user_id = record.user.id;
                let change = {
                    let mut state = self.state.lock();
                    state.apply(record);
                    state.settle(&SessionMachineInput::SessionRestored)
                };
                self.notify(change);
                info!(user_id, "Session restored from storage");
                RestoreOutcome::Restored
            }
            Ok(Some(_)) => {
                warn!("Stored session has an empty token, discarding");
                self.logout();
                RestoreOutcome::Discarded
            }
            Ok(None) => {
                debug!("No stored session");
                RestoreOutcome::Empty
            }
            Err(VaultError::Corrupt(reason)) => {
                warn!(reason = %reason, "Stored session is corrupt, discarding");
                self.logout();
                RestoreOutcome::Discarded
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                RestoreOutcome::Empty
            }
        }
    }

    /// Load from storage once per process, and only while logged out.
    ///
    /// Returns `None` when nothing was attempted.
    pub fn hydrate_once(&self) -> Option<RestoreOutcome> {
        if self.is_logged_in() {
            return None;
        }
        if self.hydrated.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.load_from_storage())
    }

    /// Re-fetch the current user and persist it.
    ///
    /// No-op (`Ok(None)`) without a token. If the server rejects the token
    /// the session is ended and the error returned.
    pub async fn refresh_user(&self) -> AuthResult<Option<User>> {
        let Some(token) = self.token() else {
            debug!("No session to refresh");
            return Ok(None);
        };
        let generation = self.begin(SessionMachineInput::RefreshAttempt)?;

        match self.api.fetch_current_user(&token).await {
            Ok(user) => {
                let fresh = user.clone();
                // On a storage failure the old session stays
                self.commit(
                    generation,
                    |current| {
                        current.map(|mut record| {
                            record.user = fresh;
                            record
                        })
                    },
                    Some(SessionMachineInput::RefreshSuccess),
                    Some(SessionMachineInput::RefreshSuccess),
                    REFRESH_FAILED,
                )?;
                debug!(user_id = user.id, "User refreshed");
                Ok(Some(user))
            }
            Err(e) => {
                let change = {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        debug!(error = %e, "Ignoring failure of superseded refresh");
                        return Err(e);
                    }
                    self.end_session(&mut state, &SessionMachineInput::RefreshFailed)
                };
                self.notify(change);
                warn!(error = %e, "User refresh failed, session ended");
                Err(e)
            }
        }
    }

    /// Make `program_id` the active program.
    ///
    /// The server issues a program-scoped token and the role held there;
    /// both replace the current ones. No-op (`Ok(None)`) without a token.
    /// On failure the session is kept and `error` is set.
    pub async fn switch_program(&self, program_id: i64) -> AuthResult<Option<ProgramSwitch>> {
        let Some(token) = self.token() else {
            debug!(program_id, "No session, not switching program");
            return Ok(None);
        };
        let generation = self.begin(SessionMachineInput::SwitchAttempt)?;

        match self.api.switch_program(&token, program_id).await {
            Ok(switch) => {
                let applied = switch.clone();
                self.commit(
                    generation,
                    |current| {
                        current.map(|mut record| {
                            record.token = applied.token;
                            record.current_program_id = Some(applied.program_id);
                            record.user.role = applied.role;
                            record.user.current_program_id = Some(applied.program_id);
                            record
                        })
                    },
                    Some(SessionMachineInput::SwitchSettled),
                    Some(SessionMachineInput::SwitchSettled),
                    SWITCH_FAILED,
                )?;
                info!(program_id = switch.program_id, role = %switch.role, "Switched program");
                Ok(Some(switch))
            }
            Err(e) => {
                warn!(program_id, error = %e, "Program switch failed");
                Err(self.fail(generation, e, SessionMachineInput::SwitchSettled, SWITCH_FAILED))
            }
        }
    }

    /// Replace the program access list from the server and persist it.
    ///
    /// Does not change the phase, and is refused while another operation
    /// is in flight. A newer call supersedes an older one. No-op
    /// (`Ok(None)`) without a token; on failure the session is kept and
    /// `error` is set.
    pub async fn refresh_programs(&self) -> AuthResult<Option<Vec<ProgramAccess>>> {
        let (token, generation) = {
            let mut state = self.state.lock();
            let Some(token) = state.token.clone() else {
                return Ok(None);
            };
            let phase = state.phase();
            if phase.is_loading() {
                return Err(AuthError::InvalidStateTransition(format!(
                    "Cannot refresh programs while {}",
                    phase
                )));
            }
            state.error = None;
            state.generation += 1;
            (token, state.generation)
        };

        match self.api.fetch_programs(&token).await {
            Ok(programs) => {
                let fresh = programs.clone();
                self.commit(
                    generation,
                    |current| {
                        current.map(|mut record| {
                            record.programs = fresh;
                            record
                        })
                    },
                    None,
                    None,
                    PROGRAMS_FAILED,
                )?;
                debug!(count = programs.len(), "Programs refreshed");
                Ok(Some(programs))
            }
            Err(e) => {
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.error = Some(e.user_message(PROGRAMS_FAILED));
                }
                warn!(error = %e, "Program list refresh failed");
                Err(e)
            }
        }
    }
}
