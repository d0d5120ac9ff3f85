//! Shared fixtures for the module tests.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::Config;

pub const TEST_KEY: &str = include_str!("../tests/fixtures/app_key.pem");

pub fn stub_config(api_base: &str) -> Config {
    Config {
        app_id: "12345".to_owned(),
        private_key: TEST_KEY.to_owned(),
        webhook_secret: "s3cret".to_owned(),
        installation_id: None,
        port: 5000,
        webhook_path: "/api/webhook".to_owned(),
        api_base: api_base.to_owned(),
    }
}

/// Mounts the `GET /app` profile reply every bootstrap performs.
pub async fn stub_profile(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": id, "name": "test-app"})),
        )
        .mount(server)
        .await;
}
