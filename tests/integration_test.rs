use lobby_server::{args::Args, helpers};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use serial_test::serial;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

async fn spawn_app() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    tokio::spawn(async move {
        lobby_server::run(Args {
            host: addr,
            jwt_secret: "test-secret".to_string(),
        })
        .await
        .unwrap();
    });
    sleep(Duration::from_millis(100)).await;
    addr
}

async fn login(client: &Client, addr: SocketAddr, username: &str, password: &str) -> String {
    let response = client
        .post(format!("http://{}/auth/challenge", addr))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let challenge = body["challenge"].as_str().unwrap();

    let login_payload = helpers::generate_login_payload(username, password, challenge).unwrap();
    let response = client
        .post(format!("http://{}/auth/login", addr))
        .header("Content-Type", "application/json")
        .body(login_payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn create_lobby(client: &Client, addr: SocketAddr, token: &str, is_private: bool) -> Value {
    let response = client
        .post(format!("http://{}/lobbies", addr))
        .bearer_auth(token)
        .json(&serde_json::json!({ "is_private": is_private }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
#[serial]
async fn test_authentication_flow() {
    let addr = spawn_app().await;
    let client = Client::new();

    let token = login(&client, addr, "testuser", "testpass").await;
    assert!(!token.is_empty());
}

#[tokio::test]
#[serial]
async fn test_authentication_flow_invalid_signature() {
    let addr = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("http://{}/auth/challenge", addr))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let challenge = body["challenge"].as_str().unwrap();

    let login_payload_str =
        helpers::generate_login_payload("testuser", "testpass", challenge).unwrap();
    let mut login_payload: Value = serde_json::from_str(&login_payload_str).unwrap();
    login_payload["signature_b64"] = Value::String("aW52YWxpZCBzaWduYXR1cmU=".to_string());

    let response = client
        .post(format!("http://{}/auth/login", addr))
        .json(&login_payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_challenge_cannot_be_reused() {
    let addr = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("http://{}/auth/challenge", addr))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let challenge = body["challenge"].as_str().unwrap();
    let login_payload = helpers::generate_login_payload("player_a", "pass_a", challenge).unwrap();

    for expected in [StatusCode::OK, StatusCode::UNAUTHORIZED] {
        let response = client
            .post(format!("http://{}/auth/login", addr))
            .header("Content-Type", "application/json")
            .body(login_payload.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
#[serial]
async fn test_lobby_routes_require_token() {
    let addr = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("http://{}/lobbies", addr))
        .json(&serde_json::json!({ "is_private": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_public_and_private_lobbies() {
    let addr = spawn_app().await;
    let client = Client::new();
    let token_a = login(&client, addr, "player_a", "pass_a").await;

    let public = create_lobby(&client, addr, &token_a, false).await;
    let private = create_lobby(&client, addr, &token_a, true).await;
    assert_eq!(public["status"], "Lobby");
    assert_eq!(public["player_count"], 0);
    assert_eq!(
        public["owner"].as_str().unwrap(),
        helpers::get_public_key("player_a", "pass_a").unwrap()
    );

    let response = client
        .get(format!("http://{}/lobbies", addr))
        .send()
        .await
        .unwrap();
    let listed: Vec<Value> = response.json().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], public["id"]);

    // Private lobbies are still reachable by id.
    let response = client
        .get(format!("http://{}/lobbies/{}", addr, private["id"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["roster"], serde_json::json!([]));
    assert_eq!(view["started_at"], Value::Null);
}

#[tokio::test]
#[serial]
async fn test_join_unknown_lobby_is_not_found() {
    let addr = spawn_app().await;
    let client = Client::new();
    let token = login(&client, addr, "player_b", "pass_b").await;

    let response = client
        .post(format!(
            "http://{}/lobbies/{}/join",
            addr,
            uuid::Uuid::new_v4()
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_start_requires_owner_and_participants() {
    let addr = spawn_app().await;
    let client = Client::new();
    let token_a = login(&client, addr, "player_a", "pass_a").await;
    let token_b = login(&client, addr, "player_b", "pass_b").await;

    let lobby = create_lobby(&client, addr, &token_a, false).await;
    let lobby_id = lobby["id"].as_str().unwrap();

    let response = client
        .post(format!("http://{}/lobbies/{}/join", addr, lobby_id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("http://{}/lobbies/{}/start", addr, lobby_id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nobody has connected yet, so the roster is empty.
    let response = client
        .post(format!("http://{}/lobbies/{}/start", addr, lobby_id))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no participants"));

    let response = client
        .get(format!("http://{}/lobbies/{}", addr, lobby_id))
        .send()
        .await
        .unwrap();
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["status"], "Lobby");
}
