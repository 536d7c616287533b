//! Scripted [`AuthApi`] for tests.
//!
//! Each endpoint pops the next queued reply. A reply can be gated on a
//! oneshot so a test decides when an in-flight call completes.

use crate::{
    AuthApi, AuthError, AuthResult, Credentials, LoginResponse, ProgramAccess, ProgramSwitch,
    Role, SignupRequest, SignupResponse, User,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// A queued reply.
pub struct Reply<T> {
    result: AuthResult<T>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            result: Ok(value),
            gate: None,
        }
    }

    pub fn err(error: AuthError) -> Self {
        Self {
            result: Err(error),
            gate: None,
        }
    }

    /// Hold the reply until the returned sender fires (or is dropped).
    pub fn gated(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.gate = Some(rx);
        (self, tx)
    }

    async fn resolve(self) -> AuthResult<T> {
        if let Some(gate) = self.gate {
            let _ = gate.await;
        }
        self.result
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Login { email: String },
    Signup { email: String },
    FetchCurrentUser { token: String },
    SwitchProgram { token: String, program_id: i64 },
    FetchPrograms { token: String },
}

#[derive(Default)]
pub struct ScriptedApi {
    login: Mutex<VecDeque<Reply<LoginResponse>>>,
    signup: Mutex<VecDeque<Reply<SignupResponse>>>,
    current_user: Mutex<VecDeque<Reply<User>>>,
    switch: Mutex<VecDeque<Reply<ProgramSwitch>>>,
    programs: Mutex<VecDeque<Reply<Vec<ProgramAccess>>>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_login(&self, reply: Reply<LoginResponse>) {
        self.login.lock().push_back(reply);
    }

    pub fn push_signup(&self, reply: Reply<SignupResponse>) {
        self.signup.lock().push_back(reply);
    }

    pub fn push_current_user(&self, reply: Reply<User>) {
        self.current_user.lock().push_back(reply);
    }

    pub fn push_switch(&self, reply: Reply<ProgramSwitch>) {
        self.switch.lock().push_back(reply);
    }

    pub fn push_programs(&self, reply: Reply<Vec<ProgramAccess>>) {
        self.programs.lock().push_back(reply);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    fn next<T>(&self, queue: &Mutex<VecDeque<Reply<T>>>, call: ApiCall) -> Reply<T> {
        let endpoint = format!("{:?}", call);
        self.calls.lock().push(call);
        queue.lock().pop_front().unwrap_or_else(|| {
            Reply::err(AuthError::Config(format!("no scripted reply for {}", endpoint)))
        })
    }
}

#[async_trait]
impl AuthApi for ScriptedApi {
    async fn login(&self, credentials: &Credentials) -> AuthResult<LoginResponse> {
        let call = ApiCall::Login {
            email: credentials.email.clone(),
        };
        self.next(&self.login, call).resolve().await
    }

    async fn signup(&self, request: &SignupRequest) -> AuthResult<SignupResponse> {
        let call = ApiCall::Signup {
            email: request.email.clone(),
        };
        self.next(&self.signup, call).resolve().await
    }

    async fn fetch_current_user(&self, token: &str) -> AuthResult<User> {
        let call = ApiCall::FetchCurrentUser {
            token: token.to_string(),
        };
        self.next(&self.current_user, call).resolve().await
    }

    async fn switch_program(&self, token: &str, program_id: i64) -> AuthResult<ProgramSwitch> {
        let call = ApiCall::SwitchProgram {
            token: token.to_string(),
            program_id,
        };
        self.next(&self.switch, call).resolve().await
    }

    async fn fetch_programs(&self, token: &str) -> AuthResult<Vec<ProgramAccess>> {
        let call = ApiCall::FetchPrograms {
            token: token.to_string(),
        };
        self.next(&self.programs, call).resolve().await
    }
}

/// A user with the given id and role.
pub fn user(id: i64, email: &str, role: Role) -> User {
    User {
        id,
        email: email.to_string(),
        first_name: None,
        last_name: None,
        role,
        current_program_id: None,
    }
}

/// A login reply for `user` with token `token`.
pub fn login_response(token: &str, user: User) -> LoginResponse {
    LoginResponse {
        token: token.to_string(),
        user,
        programs: Vec::new(),
    }
}

/// A rejection carrying `message`.
pub fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Rejected {
        status,
        message: Some(message.to_string()),
    }
}
