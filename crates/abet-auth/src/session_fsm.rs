//! Session phase state machine using rust-fsm.
//!
//! The session data (token, user, programs) lives in the
//! [`SessionManager`](crate::SessionManager); this machine tracks which
//! operation, if any, is in flight. "Loading" is not a separate flag: it is
//! whatever the machine says when it sits in a transient phase.
//!
//! ## State Diagram
//!
//! ```text
//!                 AuthAttempt
//! ┌─────────────┐ ──────────────► ┌─────────────┐
//! │ NotLoggedIn │                 │  SigningIn  │
//! └─────────────┘ ◄────────────── └──────┬──────┘
//!        ▲        Rejected/SignupPending │ Authenticated
//!        │                               ▼
//!        │ LogoutRequested        ┌─────────────┐  AuthAttempt   ┌──────────────────┐
//!        │ (from any phase)       │  LoggedIn   │ ─────────────► │ Reauthenticating │
//!        │                        └──┬───────┬──┘ ◄───────────── └──────────────────┘
//!        │                           │       │    Authenticated/Rejected
//!        │ RefreshFailed  RefreshAttempt   SwitchAttempt
//!        │                           ▼       ▼
//!        │                 ┌────────────┐ ┌──────────────────┐
//!        └──────────────── │ Refreshing │ │ SwitchingProgram │
//!                          └────────────┘ └──────────────────┘
//!                      RefreshSuccess ─► LoggedIn ◄─ SwitchSettled
//! ```
//!
//! A token is held exactly in `LoggedIn`, `Reauthenticating`, `Refreshing`
//! and `SwitchingProgram`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(NotLoggedIn)

    NotLoggedIn => {
        AuthAttempt => SigningIn,
        SessionRestored => LoggedIn,
        LogoutRequested => NotLoggedIn
    },
    SigningIn => {
        AuthAttempt => SigningIn,
        Authenticated => LoggedIn,
        Rejected => NotLoggedIn,
        // Signup accepted without a token; the user still has to log in
        SignupPending => NotLoggedIn,
        // Storage restored mid-login: the session now holds a token
        SessionRestored => Reauthenticating,
        LogoutRequested => NotLoggedIn
    },
    Reauthenticating => {
        AuthAttempt => Reauthenticating,
        Authenticated => LoggedIn,
        // A failed re-login keeps the session it started from
        Rejected => LoggedIn,
        SignupPending => LoggedIn,
        RefreshAttempt => Refreshing,
        SwitchAttempt => SwitchingProgram,
        SessionRestored => Reauthenticating,
        LogoutRequested => NotLoggedIn
    },
    LoggedIn => {
        AuthAttempt => Reauthenticating,
        RefreshAttempt => Refreshing,
        SwitchAttempt => SwitchingProgram,
        SessionRestored => LoggedIn,
        LogoutRequested => NotLoggedIn
    },
    Refreshing => {
        AuthAttempt => Reauthenticating,
        RefreshAttempt => Refreshing,
        RefreshSuccess => LoggedIn,
        RefreshFailed => NotLoggedIn,
        SwitchAttempt => SwitchingProgram,
        SessionRestored => Refreshing,
        LogoutRequested => NotLoggedIn
    },
    SwitchingProgram => {
        AuthAttempt => Reauthenticating,
        RefreshAttempt => Refreshing,
        SwitchAttempt => SwitchingProgram,
        SwitchSettled => LoggedIn,
        SessionRestored => SwitchingProgram,
        LogoutRequested => NotLoggedIn
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption (CLI output, callbacks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session.
    #[default]
    NotLoggedIn,
    /// Login or signup in flight with no prior session.
    SigningIn,
    /// Login or signup in flight on top of an existing session.
    Reauthenticating,
    /// Session established, nothing in flight.
    LoggedIn,
    /// Re-fetching the current user.
    Refreshing,
    /// Switching the active program.
    SwitchingProgram,
}

impl SessionPhase {
    /// Returns true while an operation is in flight.
    pub fn is_loading(&self) -> bool {
        !matches!(self, SessionPhase::NotLoggedIn | SessionPhase::LoggedIn)
    }

    /// Returns true if the phase implies a held token.
    pub fn holds_token(&self) -> bool {
        !matches!(self, SessionPhase::NotLoggedIn | SessionPhase::SigningIn)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::NotLoggedIn => SessionPhase::NotLoggedIn,
            SessionMachineState::SigningIn => SessionPhase::SigningIn,
            SessionMachineState::Reauthenticating => SessionPhase::Reauthenticating,
            SessionMachineState::LoggedIn => SessionPhase::LoggedIn,
            SessionMachineState::Refreshing => SessionPhase::Refreshing,
            SessionMachineState::SwitchingProgram => SessionPhase::SwitchingProgram,
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::NotLoggedIn => "not logged in",
            SessionPhase::SigningIn => "signing in",
            SessionPhase::Reauthenticating => "re-authenticating",
            SessionPhase::LoggedIn => "logged in",
            SessionPhase::Refreshing => "refreshing",
            SessionPhase::SwitchingProgram => "switching program",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(inputs: &[SessionMachineInput]) -> SessionMachine {
        let mut machine = SessionMachine::new();
        for input in inputs {
            machine.consume(input).unwrap();
        }
        machine
    }

    fn phase(machine: &SessionMachine) -> SessionPhase {
        SessionPhase::from(machine.state())
    }

    #[test]
    fn test_initial_state_is_not_logged_in() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::NotLoggedIn);
        assert!(!phase(&machine).is_loading());
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        assert_eq!(phase(&machine), SessionPhase::SigningIn);
        assert!(phase(&machine).is_loading());

        machine.consume(&SessionMachineInput::Authenticated).unwrap();
        assert_eq!(phase(&machine), SessionPhase::LoggedIn);
        assert!(!phase(&machine).is_loading());
    }

    #[test]
    fn test_rejected_login_returns_to_not_logged_in() {
        let machine = machine_in(&[
            SessionMachineInput::AuthAttempt,
            SessionMachineInput::Rejected,
        ]);
        assert_eq!(phase(&machine), SessionPhase::NotLoggedIn);
    }

    #[test]
    fn test_rejected_relogin_keeps_session() {
        let machine = machine_in(&[
            SessionMachineInput::SessionRestored,
            SessionMachineInput::AuthAttempt,
            SessionMachineInput::Rejected,
        ]);
        assert_eq!(phase(&machine), SessionPhase::LoggedIn);
    }

    #[test]
    fn test_restore_during_sign_in_holds_token() {
        let machine = machine_in(&[
            SessionMachineInput::AuthAttempt,
            SessionMachineInput::SessionRestored,
        ]);
        assert_eq!(phase(&machine), SessionPhase::Reauthenticating);
        assert!(phase(&machine).holds_token());
    }

    #[test]
    fn test_refresh_failure_ends_session() {
        let machine = machine_in(&[
            SessionMachineInput::SessionRestored,
            SessionMachineInput::RefreshAttempt,
            SessionMachineInput::RefreshFailed,
        ]);
        assert_eq!(phase(&machine), SessionPhase::NotLoggedIn);
    }

    #[test]
    fn test_switch_settles_to_logged_in() {
        let mut machine = machine_in(&[SessionMachineInput::SessionRestored]);

        machine.consume(&SessionMachineInput::SwitchAttempt).unwrap();
        assert_eq!(phase(&machine), SessionPhase::SwitchingProgram);

        machine.consume(&SessionMachineInput::SwitchSettled).unwrap();
        assert_eq!(phase(&machine), SessionPhase::LoggedIn);
    }

    #[test]
    fn test_cannot_refresh_without_session() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::RefreshAttempt).is_err());
        assert!(machine.consume(&SessionMachineInput::SwitchAttempt).is_err());
        assert_eq!(phase(&machine), SessionPhase::NotLoggedIn);
    }

    #[test]
    fn test_logout_from_every_phase() {
        let paths: [&[SessionMachineInput]; 6] = [
            &[],
            &[SessionMachineInput::AuthAttempt],
            &[SessionMachineInput::SessionRestored],
            &[
                SessionMachineInput::SessionRestored,
                SessionMachineInput::AuthAttempt,
            ],
            &[
                SessionMachineInput::SessionRestored,
                SessionMachineInput::RefreshAttempt,
            ],
            &[
                SessionMachineInput::SessionRestored,
                SessionMachineInput::SwitchAttempt,
            ],
        ];

        for inputs in paths {
            let mut machine = machine_in(inputs);
            machine.consume(&SessionMachineInput::LogoutRequested).unwrap();
            assert_eq!(phase(&machine), SessionPhase::NotLoggedIn);
        }
    }

    #[test]
    fn test_loading_and_token_by_phase() {
        assert!(!SessionPhase::NotLoggedIn.is_loading());
        assert!(!SessionPhase::LoggedIn.is_loading());
        assert!(SessionPhase::SigningIn.is_loading());
        assert!(SessionPhase::Reauthenticating.is_loading());
        assert!(SessionPhase::Refreshing.is_loading());
        assert!(SessionPhase::SwitchingProgram.is_loading());

        assert!(!SessionPhase::NotLoggedIn.holds_token());
        assert!(!SessionPhase::SigningIn.holds_token());
        assert!(SessionPhase::LoggedIn.holds_token());
        assert!(SessionPhase::Refreshing.holds_token());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&SessionPhase::SwitchingProgram).unwrap();
        assert_eq!(json, "\"switching_program\"");
    }
}
