//! Project query service: repository listing and README fetch.
//!
//! A single entry point multiplexes on method and path, the way the
//! service's browser callers expect it: permissive CORS on every reply,
//! `OPTIONS` short-circuited before any business logic, and a blanket 401
//! for anything unrecognized.

use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use base64::Engine;

use crate::appclient::{ApiError, AppClient};
use crate::ghapi;

fn with_cors(builder: &mut HttpResponseBuilder) -> &mut HttpResponseBuilder {
    builder
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "OPTIONS, GET"))
        .insert_header(("Access-Control-Allow-Headers", "*"))
}

fn bad_request(message: &str) -> HttpResponse {
    with_cors(&mut HttpResponse::BadRequest()).json(serde_json::json!({ "error": message }))
}

/// Map an upstream failure onto the reply: the upstream status (with its
/// message) when there is one, 502 for transport faults.
fn upstream_error(context: &str, err: &ApiError) -> HttpResponse {
    log::error!("{context}: {err}");
    match err {
        ApiError::Status { status, message } => with_cors(&mut HttpResponseBuilder::new(*status))
            .json(serde_json::json!({ "error": message, "status": status.as_u16() })),
        ApiError::Transport(message) => {
            with_cors(&mut HttpResponse::BadGateway()).json(serde_json::json!({ "error": message }))
        }
    }
}

#[derive(serde::Serialize)]
struct ReposReply {
    id: u64,
    repos: Vec<ghapi::Repository>,
}

#[derive(serde::Deserialize)]
struct RepoQuery {
    #[serde(default)]
    owner: String,
    #[serde(default)]
    repo: String,
}

/// The contents API base64-encodes file bodies with embedded line breaks.
fn decode_contents(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| format!("contents payload is not valid base64: {err}"))?;
    String::from_utf8(bytes).map_err(|err| format!("decoded contents are not UTF-8: {err}"))
}

async fn list_repos(app: &AppClient) -> HttpResponse {
    let mut repos = Vec::new();
    if let Err(err) = app.each_repository(|repository| repos.push(repository)).await {
        return upstream_error("repository enumeration failed", &err);
    }

    with_cors(&mut HttpResponse::Ok()).json(ReposReply {
        id: app.profile().id,
        repos,
    })
}

async fn fetch_readme(app: &AppClient, req: &HttpRequest) -> HttpResponse {
    let query = match web::Query::<RepoQuery>::from_query(req.query_string()) {
        Ok(query) => query.into_inner(),
        Err(_) => return bad_request("malformed query string"),
    };
    if query.owner.is_empty() || query.repo.is_empty() {
        return bad_request("both 'owner' and 'repo' query parameters are required");
    }

    let installation = match app.installation_id() {
        Some(id) => id,
        None => match app.repository_installation(&query.owner, &query.repo).await {
            Ok(id) => id,
            Err(err) => return upstream_error("installation lookup failed", &err),
        },
    };

    let path = format!("/repos/{}/{}/contents/README.md", query.owner, query.repo);
    let contents = match app
        .request_as_installation(Method::GET, &path, installation)
        .await
    {
        Ok(contents) => contents,
        Err(err) => return upstream_error("contents fetch failed", &err),
    };

    let encoded = match contents.get("content").and_then(|value| value.as_str()) {
        Some(encoded) => encoded,
        None => {
            return upstream_error(
                "contents fetch failed",
                &ApiError::Transport("contents payload has no 'content' field".to_owned()),
            )
        }
    };
    match decode_contents(encoded) {
        Ok(content) => {
            with_cors(&mut HttpResponse::Ok()).json(serde_json::json!({ "content": content }))
        }
        Err(message) => upstream_error("contents decode failed", &ApiError::Transport(message)),
    }
}

/// Single entry point of the project service.
pub async fn entry(app: web::Data<AppClient>, req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        return with_cors(&mut HttpResponse::Ok()).finish();
    }

    if req.method() == Method::GET && req.path() == "/projects/repos" {
        list_repos(&app).await
    } else if req.method() == Method::GET && req.path() == "/projects/repo" {
        fetch_readme(&app, &req).await
    } else {
        // default-deny; deliberately not a 404
        with_cors(&mut HttpResponse::Unauthorized()).finish()
    }
}
