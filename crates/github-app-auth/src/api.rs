//! Installation token exchange against the GitHub REST API
//!
//! Two calls, both authenticated with the App JWT:
//! 1. `GET /repos/{owner}/{repo}/installation` resolves the installation id
//! 2. `POST /app/installations/{id}/access_tokens` mints the scoped token
//!
//! Status mapping is shared by both steps. 401 becomes
//! `Error::Unauthorized`; every other failure (including 422, the rate
//! limit signal) becomes the step's own error with the status attached.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::constants::{ACCEPT_HEADER, API_VERSION, USER_AGENT};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    id: u64,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<String>,
}

/// Which exchange step a failure belongs to.
#[derive(Debug, Clone, Copy)]
enum Step {
    Lookup,
    Create,
}

impl Step {
    fn error(self, status: Option<u16>, message: String) -> Error {
        match self {
            Step::Lookup => Error::InstallationLookup { status, message },
            Step::Create => Error::AccessToken { status, message },
        }
    }
}

fn with_app_headers(request: RequestBuilder, jwt: &str) -> RequestBuilder {
    request
        .bearer_auth(jwt)
        .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header("X-GitHub-Api-Version", API_VERSION)
}

async fn send(request: RequestBuilder, step: Step) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| step.error(None, format!("request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized(format!("GitHub returned {status}: {body}")));
    }

    Err(step.error(
        Some(status.as_u16()),
        format!("GitHub returned {status}: {body}"),
    ))
}

/// Resolve the installation id of the App on `owner/repo`.
pub async fn installation_id(
    client: &reqwest::Client,
    api_base: &str,
    jwt: &str,
    owner: &str,
    repo: &str,
) -> Result<u64> {
    let url = format!(
        "{}/repos/{owner}/{repo}/installation",
        api_base.trim_end_matches('/')
    );
    let response = send(with_app_headers(client.get(&url), jwt), Step::Lookup).await?;

    let installation = response
        .json::<InstallationResponse>()
        .await
        .map_err(|e| Step::Lookup.error(None, format!("invalid installation response: {e}")))?;

    debug!(owner, repo, installation_id = installation.id, "resolved installation");
    Ok(installation.id)
}

/// Mint an installation access token for `installation_id`.
pub async fn create_installation_token(
    client: &reqwest::Client,
    api_base: &str,
    jwt: &str,
    installation_id: u64,
) -> Result<String> {
    let url = format!(
        "{}/app/installations/{installation_id}/access_tokens",
        api_base.trim_end_matches('/')
    );
    let response = send(with_app_headers(client.post(&url), jwt), Step::Create).await?;

    let created = response
        .json::<AccessTokenResponse>()
        .await
        .map_err(|e| Step::Create.error(None, format!("invalid access token response: {e}")))?;

    debug!(
        installation_id,
        expires_at = created.expires_at.as_deref().unwrap_or("unknown"),
        "created installation token"
    );
    Ok(created.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn installation_id_sends_app_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/installation"))
            .and(header("authorization", "Bearer app.jwt.value"))
            .and(header("accept", ACCEPT_HEADER))
            .and(header("x-github-api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 987,
                "app_id": 12345
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = installation_id(
            &reqwest::Client::new(),
            &server.uri(),
            "app.jwt.value",
            "acme",
            "widgets",
        )
        .await
        .unwrap();
        assert_eq!(id, 987);
    }

    #[tokio::test]
    async fn create_token_posts_to_installation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/987/access_tokens"))
            .and(header("authorization", "Bearer app.jwt.value"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "ghs_abc123",
                "expires_at": "2026-10-19T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = create_installation_token(
            &reqwest::Client::new(),
            &format!("{}/", server.uri()),
            "app.jwt.value",
            987,
        )
        .await
        .unwrap();
        assert_eq!(token, "ghs_abc123");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_unauthorized_on_both_steps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let lookup = installation_id(&client, &server.uri(), "jwt", "acme", "widgets")
            .await
            .unwrap_err();
        assert!(lookup.is_unauthorized(), "got: {lookup:?}");
        assert!(lookup.to_string().contains("Bad credentials"));

        let create = create_installation_token(&client, &server.uri(), "jwt", 987)
            .await
            .unwrap_err();
        assert!(create.is_unauthorized(), "got: {create:?}");
    }

    #[tokio::test]
    async fn unprocessable_is_rate_limited_step_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let lookup = installation_id(&client, &server.uri(), "jwt", "acme", "widgets")
            .await
            .unwrap_err();
        assert!(matches!(lookup, Error::InstallationLookup { status: Some(422), .. }));
        assert!(lookup.is_rate_limited());

        let create = create_installation_token(&client, &server.uri(), "jwt", 987)
            .await
            .unwrap_err();
        assert!(matches!(create, Error::AccessToken { status: Some(422), .. }));
        assert!(create.is_rate_limited());
    }

    #[tokio::test]
    async fn other_failures_keep_their_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let lookup = installation_id(&client, &server.uri(), "jwt", "acme", "widgets")
            .await
            .unwrap_err();
        assert_eq!(lookup.status(), Some(404));
        assert!(matches!(lookup, Error::InstallationLookup { .. }));

        let create = create_installation_token(&client, &server.uri(), "jwt", 987)
            .await
            .unwrap_err();
        assert_eq!(create.status(), Some(503));
        assert!(matches!(create, Error::AccessToken { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_step_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\":true}"))
            .mount(&server)
            .await;

        let err = installation_id(&reqwest::Client::new(), &server.uri(), "jwt", "acme", "widgets")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InstallationLookup { status: None, .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_step_error() {
        // Nothing listens on port 9 of localhost in the test environment
        let err = create_installation_token(&reqwest::Client::new(), "http://127.0.0.1:9", "jwt", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessToken { status: None, .. }));
    }
}
