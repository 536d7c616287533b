//! reqwest implementation of [`AuthApi`].

use crate::{
    AuthApi, AuthError, AuthResult, Credentials, LoginResponse, ProgramAccess, ProgramSwitch,
    SignupRequest, SignupResponse, User,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const LOGIN_PATH: &str = "api/users/login";
const SIGNUP_PATH: &str = "api/users/signup";
const CURRENT_USER_PATH: &str = "api/users/me";
const SWITCH_PROGRAM_PATH: &str = "api/users/switch-program";
const MY_PROGRAMS_PATH: &str = "api/users/my-programs";

/// HTTP client for the assessment server.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http_client: Client,
    api_url: Url,
}

impl HttpAuthApi {
    /// Create a client for the server at `api_url`.
    pub fn new(api_url: Url, timeout: Duration) -> AuthResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        let base = self.api_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// Send `request` and decode the payload, unwrapping the server's
    /// `{success, message, data}` envelope when present.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AuthResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(status = %status, message = ?message, "Request rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        decode_payload(&body)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> AuthResult<LoginResponse> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(url = %url, email = %credentials.email, "Attempting login");
        self.send(self.http_client.post(url).json(credentials)).await
    }

    async fn signup(&self, request: &SignupRequest) -> AuthResult<SignupResponse> {
        let url = self.endpoint(SIGNUP_PATH)?;
        debug!(url = %url, email = %request.email, "Attempting signup");
        self.send(self.http_client.post(url).json(request)).await
    }

    async fn fetch_current_user(&self, token: &str) -> AuthResult<User> {
        let url = self.endpoint(CURRENT_USER_PATH)?;
        self.send(self.http_client.get(url).bearer_auth(token)).await
    }

    async fn switch_program(&self, token: &str, program_id: i64) -> AuthResult<ProgramSwitch> {
        let url = self.endpoint(SWITCH_PROGRAM_PATH)?;
        debug!(url = %url, program_id, "Switching program");
        let body = json!({ "programId": program_id });
        self.send(self.http_client.post(url).bearer_auth(token).json(&body))
            .await
    }

    async fn fetch_programs(&self, token: &str) -> AuthResult<Vec<ProgramAccess>> {
        let url = self.endpoint(MY_PROGRAMS_PATH)?;
        self.send(self.http_client.get(url).bearer_auth(token)).await
    }
}

fn decode_payload<T: DeserializeOwned>(body: &str) -> AuthResult<T> {
    let value: Value = serde_json::from_str(body)?;

    if let Value::Object(map) = &value {
        if map.contains_key("success") {
            if let Some(data) = map.get("data") {
                return Ok(serde_json::from_value(data.clone())?);
            }
        }
    }

    Ok(serde_json::from_value(value)?)
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}
