//! Wire and session data model.
//!
//! Field names follow the assessment server's JSON (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Instructor,
    Student,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Instructor => "INSTRUCTOR",
            Role::Student => "STUDENT",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_program_id: Option<i64>,
}

impl User {
    /// "First Last" when both names are set, otherwise the email.
    pub fn full_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.email.clone(),
        }
    }
}

/// A program the user can act in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAccess {
    pub program_id: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_name: Option<String>,
}

impl ProgramAccess {
    /// Role in this program, derived from `is_admin` when the server omitted it.
    pub fn effective_role(&self) -> Role {
        match self.role {
            Some(role) => role,
            None if self.is_admin => Role::Admin,
            None => Role::Instructor,
        }
    }
}

/// Login request body.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Signup request body.
///
/// The server takes the plain password in `passwordHash` and hashes it
/// itself.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(rename = "passwordHash")]
    pub password: String,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "authToken")]
    pub token: String,
    pub user: User,
    #[serde(default)]
    pub programs: Vec<ProgramAccess>,
}

/// Successful signup payload. Some deployments require a separate login
/// after signup and send no token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignupResponse {
    #[serde(default, alias = "authToken")]
    pub token: Option<String>,
    pub user: User,
}

/// Result of switching the active program: a program-scoped token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSwitch {
    pub token: String,
    pub role: Role,
    pub program_id: i64,
}

/// The persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub token: String,
    pub user: User,
    #[serde(default)]
    pub programs: Vec<ProgramAccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_program_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(token: String, user: User, programs: Vec<ProgramAccess>) -> Self {
        let current_program_id = user.current_program_id;
        Self {
            token,
            user,
            programs,
            current_program_id,
            saved_at: None,
        }
    }

    pub(crate) fn stamped(mut self) -> Self {
        self.saved_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_from_server_json() {
        let user: User = serde_json::from_str(
            r#"{"id":3,"email":"jo@uni.edu","firstName":"Jo","lastName":"Park","role":"INSTRUCTOR","currentProgramId":12}"#,
        )
        .unwrap();

        assert_eq!(user.role, Role::Instructor);
        assert_eq!(user.current_program_id, Some(12));
        assert_eq!(user.full_name(), "Jo Park");
    }

    #[test]
    fn test_full_name_with_missing_parts() {
        let user: User =
            serde_json::from_str(r#"{"id":1,"email":"a@b.c","lastName":"Kim","role":"USER"}"#)
                .unwrap();
        assert_eq!(user.full_name(), "a@b.c");
    }

    #[test]
    fn test_login_response_accepts_auth_token_alias() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"authToken":"t","user":{"id":1,"email":"a@b.c","role":"ADMIN"}}"#,
        )
        .unwrap();
        assert_eq!(response.token, "t");
        assert!(response.programs.is_empty());
    }

    #[test]
    fn test_signup_response_without_token() {
        let response: SignupResponse =
            serde_json::from_str(r#"{"user":{"id":1,"email":"a@b.c","role":"USER"}}"#).unwrap();
        assert!(response.token.is_none());
    }

    #[test]
    fn test_signup_request_uses_password_hash_field() {
        let request = SignupRequest {
            first_name: "Ada".into(),
            last_name: "L".into(),
            email: "ada@uni.edu".into(),
            password: "secret".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["passwordHash"], "secret");
        assert_eq!(json["firstName"], "Ada");
        assert!(!format!("{:?}", request).contains("secret"));
    }

    #[test]
    fn test_effective_role() {
        let program: ProgramAccess =
            serde_json::from_str(r#"{"programId":4,"isAdmin":true}"#).unwrap();
        assert_eq!(program.effective_role(), Role::Admin);

        let program: ProgramAccess =
            serde_json::from_str(r#"{"programId":4,"isAdmin":false}"#).unwrap();
        assert_eq!(program.effective_role(), Role::Instructor);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::from_str::<Role>(r#""ADMIN""#).unwrap(), Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Instructor).unwrap(), r#""INSTRUCTOR""#);
        assert!(serde_json::from_str::<Role>(r#""OWNER""#).is_err());
    }

    #[test]
    fn test_record_takes_program_from_user() {
        let user: User = serde_json::from_str(
            r#"{"id":1,"email":"a@b.c","role":"ADMIN","currentProgramId":9}"#,
        )
        .unwrap();
        let record = SessionRecord::new("t".into(), user, vec![]);
        assert_eq!(record.current_program_id, Some(9));
        assert!(record.saved_at.is_none());
        assert!(record.stamped().saved_at.is_some());
    }
}
