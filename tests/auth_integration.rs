use mealplanner::auth::{verify_access_token, RefreshClaims, TokenKind};
use mealplanner::configuration::{get_configuration, DatabaseSettings, JwtSettings};
use mealplanner::domain::{Role, UserView};
use mealplanner::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};
use std::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub jwt: JwtSettings,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let jwt = configuration.jwt.clone();
    let server = run(listener, connection_pool.clone(), jwt.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        jwt,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn register(app: &TestApp, username: &str, email: &str, password: &str) -> Value {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "username": username, "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

async fn login(app: &TestApp, email: &str, password: &str) -> Value {
    let client = reqwest::Client::new();
    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_and_persists_user() {
    let app = spawn_app().await;

    let body = register(&app, "john", "john@example.com", "SecurePass123").await;
    assert_eq!(body["email"], "john@example.com");
    assert_eq!(body["username"], "john");
    assert!(body["role"].is_null());
    assert!(body.get("password_hash").is_none());

    let row = sqlx::query("SELECT email, username FROM users WHERE email = 'john@example.com'")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");
    assert_eq!(row.get::<String, _>("username"), "john");
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for invalid_email in ["notanemail", "user@", "@example.com", "user@@example.com"] {
        let response = client
            .post(&format!("{}/auth/register", &app.address))
            .json(&json!({
                "username": "test",
                "email": invalid_email,
                "password": "SecurePass123"
            }))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject invalid email: {}",
            invalid_email
        );
    }
}

#[tokio::test]
async fn register_duplicate_email_is_conflict() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register(&app, "john", "john@example.com", "SecurePass123").await;

    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({
            "username": "john2",
            "email": "john@example.com",
            "password": "SecurePass123"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
}

// --- Login ---

#[tokio::test]
async fn login_returns_token_pair_and_user_snapshot() {
    let app = spawn_app().await;
    register(&app, "john", "john@example.com", "SecurePass123").await;

    let body = login(&app, "john@example.com", "SecurePass123").await;

    let access = body["tokens"]["access_token"].as_str().unwrap();
    assert!(body["tokens"]["refresh_token"].is_string());
    assert_eq!(body["user"]["email"], "john@example.com");
    assert!(body["user"]["role"].is_null());

    // Access claims mirror the user's (absent) membership role
    let claims = verify_access_token(access, &app.jwt).expect("access token must verify");
    assert!(claims.role.is_none());
    assert_eq!(claims.kind, TokenKind::Access);
}

#[tokio::test]
async fn login_for_unknown_user_is_401_not_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "a@x.com", "password": "secret1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn login_wrong_password_is_indistinguishable_from_unknown_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&app, "john", "john@example.com", "SecurePass123").await;

    let wrong_password = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "john@example.com", "password": "WrongPass123" }))
        .send()
        .await
        .unwrap();
    let unknown_email = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "nobody@example.com", "password": "WrongPass123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let body_a: Value = wrong_password.json().await.unwrap();
    let body_b: Value = unknown_email.json().await.unwrap();
    assert_eq!(body_a["code"], body_b["code"]);
    assert_eq!(body_a["message"], body_b["message"]);
}

// --- Refresh ---

#[tokio::test]
async fn refresh_returns_new_pair_for_same_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&app, "john", "john@example.com", "SecurePass123").await;
    let body = login(&app, "john@example.com", "SecurePass123").await;
    let refresh_token = body["tokens"]["refresh_token"].as_str().unwrap();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", refresh_token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let refreshed: Value = response.json().await.unwrap();
    assert!(refreshed["tokens"]["access_token"].is_string());
    assert!(refreshed["tokens"]["refresh_token"].is_string());
    assert_eq!(refreshed["user"]["id"], body["user"]["id"]);
}

#[tokio::test]
async fn refresh_rejects_access_tokens() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&app, "john", "john@example.com", "SecurePass123").await;
    let body = login(&app, "john@example.com", "SecurePass123").await;
    let access_token = body["tokens"]["access_token"].as_str().unwrap();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "REFRESH_TOKEN_INVALID");
}

#[tokio::test]
async fn refresh_without_bearer_is_401() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn expired_refresh_token_is_invalid_even_when_user_is_gone() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let created = register(&app, "ghost", "ghost@example.com", "SecurePass123").await;
    let user_id: uuid::Uuid = created["id"].as_str().unwrap().parse().unwrap();

    // Hand-craft a refresh token that expired an hour ago
    let user = UserView {
        id: user_id,
        email: "ghost@example.com".to_string(),
        username: "ghost".to_string(),
        role: None,
        family_id: None,
        created_at: chrono::Utc::now(),
    };
    let mut claims = RefreshClaims::new(&user, 3600, app.jwt.issuer.clone());
    claims.iat -= 7200;
    claims.exp -= 7200;
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(app.jwt.refresh_secret.as_bytes()),
    )
    .unwrap();

    // Delete the user as well: expiry must still win over UserNotFound
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&app.db_pool)
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", expired))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "REFRESH_TOKEN_INVALID");
}

#[tokio::test]
async fn refresh_for_deleted_user_is_user_not_found() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let created = register(&app, "gone", "gone@example.com", "SecurePass123").await;
    let body = login(&app, "gone@example.com", "SecurePass123").await;
    let refresh_token = body["tokens"]["refresh_token"].as_str().unwrap();
    let user_id: uuid::Uuid = created["id"].as_str().unwrap().parse().unwrap();

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&app.db_pool)
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", refresh_token))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

// --- Role staleness (chosen policy: re-derive at refresh time only) ---

#[tokio::test]
async fn access_token_keeps_stale_role_until_refresh() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&app, "chef", "chef@example.com", "SecurePass123").await;
    let body = login(&app, "chef@example.com", "SecurePass123").await;
    let access_token = body["tokens"]["access_token"].as_str().unwrap();
    let refresh_token = body["tokens"]["refresh_token"].as_str().unwrap();

    // Role claim at login: no family yet
    let claims = verify_access_token(access_token, &app.jwt).unwrap();
    assert!(claims.role.is_none());

    // Found a family: the user becomes CHEF in storage
    let response = client
        .post(&format!("{}/family/create-join", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({ "name": "Smiths" }))
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());

    // The outstanding access token still verifies and still carries the old
    // (now stale) role claim; it is not revoked by the membership change.
    let stale = verify_access_token(access_token, &app.jwt).unwrap();
    assert!(stale.role.is_none());
    let me = client
        .get(&format!("{}/auth/me", &app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, me.status().as_u16());

    // The refresh re-reads membership: the new access token carries CHEF
    let response = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", refresh_token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let refreshed: Value = response.json().await.unwrap();
    let new_access = refreshed["tokens"]["access_token"].as_str().unwrap();
    let fresh = verify_access_token(new_access, &app.jwt).unwrap();
    assert_eq!(fresh.role, Some(Role::Chef));
    assert_eq!(refreshed["user"]["role"], "CHEF");
}

// --- Protected routes ---

#[tokio::test]
async fn me_requires_valid_access_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(&format!("{}/auth/me", &app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(401, missing.status().as_u16());

    let garbage = client
        .get(&format!("{}/auth/me", &app.address))
        .header("Authorization", "Bearer not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(401, garbage.status().as_u16());
}

#[tokio::test]
async fn delete_user_is_chef_only() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    register(&app, "chef", "chef@example.com", "SecurePass123").await;
    let victim = register(&app, "victim", "victim@example.com", "SecurePass123").await;
    let victim_id = victim["id"].as_str().unwrap();

    // A user without any family role is rejected by the role guard
    let body = login(&app, "chef@example.com", "SecurePass123").await;
    let no_role_access = body["tokens"]["access_token"].as_str().unwrap().to_string();

    let forbidden = client
        .delete(&format!("{}/users/{}", &app.address, victim_id))
        .header("Authorization", format!("Bearer {}", no_role_access))
        .send()
        .await
        .unwrap();
    assert_eq!(403, forbidden.status().as_u16());

    // Become CHEF, refresh to pick up the role, then deletion succeeds
    client
        .post(&format!("{}/family/create-join", &app.address))
        .header("Authorization", format!("Bearer {}", no_role_access))
        .json(&json!({ "name": "Smiths" }))
        .send()
        .await
        .unwrap();
    let refresh_token = body["tokens"]["refresh_token"].as_str().unwrap();
    let refreshed: Value = client
        .post(&format!("{}/auth/refresh", &app.address))
        .header("Authorization", format!("Bearer {}", refresh_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chef_access = refreshed["tokens"]["access_token"].as_str().unwrap();

    let deleted = client
        .delete(&format!("{}/users/{}", &app.address, victim_id))
        .header("Authorization", format!("Bearer {}", chef_access))
        .send()
        .await
        .unwrap();
    assert_eq!(204, deleted.status().as_u16());
}
