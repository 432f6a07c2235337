//! Smoke tests for the contest admin server

use std::net::TcpListener;
use std::sync::Arc;

use contest_admin::auth::{AdminAuthGate, InMemoryRevocationStore, SystemClock};
use contest_admin::configuration::JwtSettings;
use contest_admin::directory::InMemoryUserDirectory;
use contest_admin::startup::run;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = JwtSettings {
        secret: "health-check-secret-key-at-least-32-chars".to_string(),
        issuer: "contest-admin-test".to_string(),
    };
    let gate = AdminAuthGate::new(
        &jwt,
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(InMemoryRevocationStore::new()),
        Arc::new(SystemClock),
    );
    let server = run(listener, gate).expect("Failed to create server");

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
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_admin_route_is_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/admin/participants", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn login_against_empty_directory_is_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/admin/login", addr))
        .json(&serde_json::json!({ "email": "a@x.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
}
