//! Integration tests for the health endpoint and envelope shape

use async_trait::async_trait;
use std::net::TcpListener;
use std::sync::Arc;

use account_service::configuration::JwtSettings;
use account_service::error::MediaError;
use account_service::media::MediaHost;
use account_service::session::SessionController;
use account_service::startup::run;
use account_service::store::InMemoryCredentialStore;

struct NoMedia;

#[async_trait]
impl MediaHost for NoMedia {
    async fn upload(&self, staged_name: &str) -> Result<String, MediaError> {
        Err(MediaError::UploadFailed(staged_name.to_string()))
    }

    async fn discard(&self, _staged_name: &str) {}
}

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt_config = JwtSettings {
        access_token_secret: "health-access".to_string(),
        access_token_expiry: 900,
        refresh_token_secret: "health-refresh".to_string(),
        refresh_token_expiry: 864000,
        issuer: "account_service".to_string(),
    };
    let controller = SessionController::new(
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(NoMedia),
        jwt_config.clone(),
    );
    let server = run(listener, controller, jwt_config).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["message"], "Service is healthy");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/users/nope", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
