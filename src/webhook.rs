//! Webhook delivery verification and dispatch.

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use hmac::Mac;

pub type HmacSha256 = hmac::Hmac<sha2::Sha256>;

type Handler = Box<dyn Fn(&serde_json::Value) -> anyhow::Result<()> + Send + Sync>;

/// Dispatch table keyed by event name. Events without a registered handler
/// fall through to a catch-all that logs the envelope, so no event type is
/// ever dropped.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<&'static str, Handler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for one event name.
    #[allow(dead_code)]
    pub fn on<F>(mut self, event: &'static str, handler: F) -> Self
    where
        F: Fn(&serde_json::Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(event, Box::new(handler));
        self
    }

    pub fn dispatch(&self, name: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        match self.handlers.get(name) {
            Some(handler) => handler(payload),
            None => {
                log::info!("webhook event '{name}': {payload}");
                Ok(())
            }
        }
    }
}

fn check_signature(
    mac: &HmacSha256,
    req: &HttpRequest,
    bytes: &[u8],
) -> Result<(), HttpResponse> {
    let signature = req
        .headers()
        .get("X-Hub-Signature-256")
        .ok_or_else(|| HttpResponse::BadRequest().body("missing signature"))?
        .as_bytes();
    if !signature.starts_with(b"sha256=") {
        return Err(HttpResponse::BadRequest().body("unsupported signature type"));
    }
    let signature = hex::decode(&signature[7..])
        .map_err(|_| HttpResponse::BadRequest().body("bad signature encoding"))?;

    let mut mac = mac.clone();
    mac.update(bytes);
    mac.verify_slice(&signature).map_err(|_| {
        log::warn!("webhook delivery rejected: signature verification failed");
        HttpResponse::Forbidden().body("invalid signature")
    })?;

    Ok(())
}

/// CORS/preflight probe on the webhook path.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// One webhook delivery: verify the signature over the raw body, parse the
/// envelope, dispatch. Handler faults are logged and answered with 500;
/// the listener keeps serving.
pub async fn deliver(
    mac: web::Data<HmacSha256>,
    router: web::Data<EventRouter>,
    req: HttpRequest,
    bytes: web::Bytes,
) -> HttpResponse {
    if let Err(response) = check_signature(&mac, &req, &bytes) {
        return response;
    }

    let name = match req
        .headers()
        .get("X-GitHub-Event")
        .and_then(|value| value.to_str().ok())
    {
        Some(name) => name.to_owned(),
        None => return HttpResponse::BadRequest().body("missing event type"),
    };
    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => return HttpResponse::BadRequest().body("payload is not valid JSON"),
    };

    match router.dispatch(&name, &payload) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => {
            log::error!("webhook handler for '{name}' failed: {err:#}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
