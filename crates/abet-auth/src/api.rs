//! The assessment server's authentication endpoints.

use crate::{
    AuthResult, Credentials, LoginResponse, ProgramAccess, ProgramSwitch, SignupRequest,
    SignupResponse, User,
};
use async_trait::async_trait;

/// Remote authentication API.
///
/// [`HttpAuthApi`](crate::HttpAuthApi) talks to the real server; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token, the user and their programs.
    async fn login(&self, credentials: &Credentials) -> AuthResult<LoginResponse>;

    /// Register a new account.
    async fn signup(&self, request: &SignupRequest) -> AuthResult<SignupResponse>;

    /// Fetch the canonical user for `token`.
    async fn fetch_current_user(&self, token: &str) -> AuthResult<User>;

    /// Switch the active program, receiving a program-scoped token.
    async fn switch_program(&self, token: &str, program_id: i64) -> AuthResult<ProgramSwitch>;

    /// List the programs the user can access.
    async fn fetch_programs(&self, token: &str) -> AuthResult<Vec<ProgramAccess>>;
}
