//! Boots the full router on an ephemeral port with the in-memory store and
//! drives it over HTTP.

use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{net::SocketAddr, time::Duration};
use taskgate::{api, auth::TokenService, store::Backend};
use tokio::net::TcpListener;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

async fn spawn_server() -> TestResult<SocketAddr> {
    let app = api::app(
        &Backend::memory(),
        TokenService::new(SecretString::from("integration-secret")),
        Duration::from_secs(5),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(addr)
}

async fn register(client: &Client, base: &str, username: &str) -> TestResult<String> {
    let response = client
        .post(format!("{base}/register"))
        .json(&json!({"username": username, "password": "pw"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn task_lifecycle_over_http() -> TestResult {
    let addr = spawn_server().await?;
    let base = format!("http://{addr}");
    let client = Client::new();

    let health = client.get(format!("{base}/health")).send().await?;
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-request-id"));

    let admin = register(&client, &base, "root").await?;
    let user = register(&client, &base, "alice").await?;

    let response = client
        .post(format!("{base}/tasks"))
        .bearer_auth(&user)
        .json(&json!({"title": "nope"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(format!("{base}/tasks"))
        .bearer_auth(&admin)
        .json(&json!({"title": "release", "description": "cut v1", "status": "open"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let response = client
        .put(format!("{base}/tasks/{id}"))
        .bearer_auth(&admin)
        .json(&json!({"status": "closed", "title": ""}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["title"], "release");
    assert_eq!(updated["description"], "cut v1");
    assert_eq!(updated["status"], "closed");

    let listed: Value = client
        .get(format!("{base}/tasks"))
        .bearer_auth(&user)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let response = client
        .delete(format!("{base}/tasks/{id}"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{base}/tasks/{id}"))
        .bearer_auth(&user)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn concurrent_first_registrations_yield_one_admin() -> TestResult {
    let addr = spawn_server().await?;
    let base = format!("http://{addr}");
    let client = Client::new();

    let mut handles = Vec::new();
    for index in 0..8 {
        let client = client.clone();
        let url = format!("{base}/register");
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"username": format!("racer-{index}"), "password": "pw"}))
                .send()
                .await?
                .json::<Value>()
                .await
        }));
    }

    let mut admins = 0;
    for handle in handles {
        let body = handle.await??;
        if body["role"] == "admin" {
            admins += 1;
        }
    }
    assert_eq!(admins, 1);
    Ok(())
}

#[tokio::test]
async fn malformed_authorization_is_unauthorized() -> TestResult {
    let addr = spawn_server().await?;
    let client = Client::new();

    let response = client
        .get(format!("http://{addr}/tasks"))
        .header("Authorization", "Token abc")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Invalid Authorization header");
    Ok(())
}
