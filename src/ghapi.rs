//! Wire types for the GitHub REST API.

#[derive(Debug, serde::Serialize)]
pub struct Claims {
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct AccessTokens {
    pub token: String,
}

/// The app's own profile, returned by `GET /app`.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct AppProfile {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct Installation {
    pub id: u64,
}

/// Page envelope of `GET /installation/repositories`.
#[derive(Debug, serde::Deserialize)]
pub struct InstallationRepositories {
    pub repositories: Vec<Repository>,
}

/// The subset of repository metadata this service exposes. Serializing
/// this struct is exactly the entry shape of the `/projects/repos` reply.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub owner: RepositoryOwner,
    pub private: bool,
    pub url: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct RepositoryOwner {
    pub id: u64,
    pub login: String,
    pub r#type: String,
}

/// Error envelope GitHub attaches to non-2xx responses.
#[derive(Debug, serde::Deserialize)]
pub struct ApiMessage {
    pub message: String,
}
