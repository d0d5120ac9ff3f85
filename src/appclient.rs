//! Authenticated GitHub App client.
//!
//! Wraps the app credentials and exposes two capabilities: acting as the
//! app itself (JWT auth, used for metadata and installation listing) and
//! acting as one installation (short-lived access token exchanged per
//! operation).

use std::time::Duration;

use actix_web::http::{Method, StatusCode};
use anyhow::Context;

use crate::ghapi;
use crate::Config;

const PER_PAGE: usize = 100;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("github request failed: {0}")]
    Transport(String),
    #[error("github responded {status}: {message}")]
    Status { status: StatusCode, message: String },
}

fn transport(err: impl std::fmt::Display) -> ApiError {
    ApiError::Transport(err.to_string())
}

fn parse<T: serde::de::DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<ghapi::ApiMessage>(body)
            .map(|m| m.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
        return Err(ApiError::Status { status, message });
    }
    serde_json::from_slice(body).map_err(|err| transport(format!("bad response body: {err}")))
}

fn http() -> awc::Client {
    awc::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .add_default_header(("User-Agent", "projectsrv"))
        .add_default_header(("Accept", "application/vnd.github.v3+json"))
        .finish()
}

pub struct AppClient {
    app_id: String,
    installation_id: Option<u64>,
    api_base: String,
    key: jsonwebtoken::EncodingKey,
    profile: ghapi::AppProfile,
}

impl AppClient {
    /// Parse the credentials and fetch the app's own profile. Everything
    /// downstream depends on this client, so any failure here is fatal.
    pub async fn bootstrap(config: &Config) -> anyhow::Result<Self> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(config.private_key.as_bytes())
            .context("private key is not a valid RSA PEM")?;

        let mut client = Self {
            app_id: config.app_id.clone(),
            installation_id: config.installation_id,
            api_base: config.api_base.clone(),
            key,
            profile: ghapi::AppProfile {
                id: 0,
                name: String::new(),
            },
        };

        let jwt = client.app_jwt()?;
        client.profile = client
            .call(Method::GET, "/app", &format!("Bearer {jwt}"))
            .await
            .context("failed to fetch the app profile")?;

        Ok(client)
    }

    /// The app profile cached at bootstrap.
    pub fn profile(&self) -> &ghapi::AppProfile {
        &self.profile
    }

    pub fn installation_id(&self) -> Option<u64> {
        self.installation_id
    }

    fn app_jwt(&self) -> Result<String, ApiError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = ghapi::Claims {
            iat: now - 60,
            exp: now + 60,
            iss: self.app_id.clone(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &self.key,
        )
        .map_err(|err| transport(format!("jwt signing failed: {err}")))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        auth: &str,
    ) -> Result<T, ApiError> {
        let mut response = http()
            .request(method, format!("{}{}", self.api_base, path))
            .insert_header(("Authorization", auth))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.body().await.map_err(transport)?;
        parse(status, &body)
    }

    async fn installation_token(&self, installation: u64) -> Result<String, ApiError> {
        let jwt = self.app_jwt()?;
        let tokens: ghapi::AccessTokens = self
            .call(
                Method::POST,
                &format!("/app/installations/{installation}/access_tokens"),
                &format!("Bearer {jwt}"),
            )
            .await?;
        Ok(tokens.token)
    }

    /// Invoke `visit` with every repository visible to every installation
    /// of the app, in the order the API yields them. A failed page fails
    /// the whole enumeration.
    pub async fn each_repository<F>(&self, mut visit: F) -> Result<(), ApiError>
    where
        F: FnMut(ghapi::Repository),
    {
        let jwt = self.app_jwt()?;
        let mut page = 1;
        loop {
            let installations: Vec<ghapi::Installation> = self
                .call(
                    Method::GET,
                    &format!("/app/installations?per_page={PER_PAGE}&page={page}"),
                    &format!("Bearer {jwt}"),
                )
                .await?;
            let last_page = installations.len() < PER_PAGE;

            for installation in installations {
                let token = self.installation_token(installation.id).await?;
                let mut repo_page = 1;
                loop {
                    let batch: ghapi::InstallationRepositories = self
                        .call(
                            Method::GET,
                            &format!(
                                "/installation/repositories?per_page={PER_PAGE}&page={repo_page}"
                            ),
                            &format!("token {token}"),
                        )
                        .await?;
                    let count = batch.repositories.len();
                    for repository in batch.repositories {
                        visit(repository);
                    }
                    if count < PER_PAGE {
                        break;
                    }
                    repo_page += 1;
                }
            }

            if last_page {
                return Ok(());
            }
            page += 1;
        }
    }

    /// Resolve the installation that covers one repository. Used when no
    /// fixed installation id is configured.
    pub async fn repository_installation(&self, owner: &str, repo: &str) -> Result<u64, ApiError> {
        let jwt = self.app_jwt()?;
        let installation: ghapi::Installation = self
            .call(
                Method::GET,
                &format!("/repos/{owner}/{repo}/installation"),
                &format!("Bearer {jwt}"),
            )
            .await?;
        Ok(installation.id)
    }

    /// Issue one API call authenticated as the given installation and
    /// return the decoded JSON body.
    pub async fn request_as_installation(
        &self,
        method: Method,
        path: &str,
        installation: u64,
    ) -> Result<serde_json::Value, ApiError> {
        let token = self.installation_token(installation).await?;
        self.call(method, path, &format!("token {token}")).await
    }
}
