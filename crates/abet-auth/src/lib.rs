//! Client-side authentication for the ABET assessment console.
//!
//! This crate provides:
//! - [`SessionManager`], the session store (login, signup, logout, restore
//!   from storage, user refresh, program switching) with token persistence
//! - An explicit FSM tracking the session phase ([`SessionPhase`])
//! - The [`AuthApi`] seam and its reqwest implementation [`HttpAuthApi`]
//! - The wire/domain model shared with the router and CLI

mod api;
mod error;
mod http;
mod model;
mod session;
mod session_fsm;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::AuthApi;
pub use error::{AuthError, AuthResult};
pub use http::HttpAuthApi;
pub use model::{
    Credentials, LoginResponse, ProgramAccess, ProgramSwitch, Role, SessionRecord,
    SignupRequest, SignupResponse, User,
};
pub use session::{
    RestoreOutcome, SessionManager, SessionPhaseCallback, SessionPhaseChanged, SessionSnapshot,
};
pub use session_fsm::{
    session_machine, SessionMachine, SessionMachineInput, SessionMachineState, SessionPhase,
};
