use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::{env, time::Duration};
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Deserialize)]
struct LoginResponse {
    id: i64,
    email: String,
}

#[derive(Deserialize)]
struct MeResponse {
    id: i64,
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct UserJson {
    id: i64,
    email: String,
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct UsersIndex {
    users: Vec<UserJson>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    code: Option<String>,
}

#[tokio::test]
async fn smoke_admin_flow() {
    dotenvy::dotenv().ok();

    // Needs a running server with Postgres and Redis behind it.
    let run_smoke = env::var("RUN_SMOKE_ADMIN")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !run_smoke {
        eprintln!("skipping smoke_admin_flow (set RUN_SMOKE_ADMIN=1 to enable)");
        return;
    }

    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3333".to_string());
    let admin_email =
        env::var("DEV_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let admin_password =
        env::var("DEV_ADMIN_PASSWORD").unwrap_or_else(|_| "password123".to_string());
    let retries: usize = env::var("SMOKE_ADMIN_RETRIES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(30);

    let client = reqwest::Client::new();
    wait_for_health(&client, &base_url, retries, 300).await;

    let bad_login = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&json!({ "email": admin_email, "password": "not-the-password" }))
        .send()
        .await
        .expect("bad login request failed");
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
    let bad_body: ErrorResponse = bad_login.json().await.expect("error json");
    assert_eq!(bad_body.code.as_deref(), Some("invalid_credentials"));

    let login = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&json!({ "email": admin_email, "password": admin_password }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(login.status(), StatusCode::OK);
    let sid_cookie = extract_sid_cookie(&login);
    let login_body: LoginResponse = login.json().await.expect("login json");
    assert_eq!(login_body.email, admin_email.to_lowercase());

    let me = client
        .get(format!("{}/api/v1/me", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("me request failed");
    assert_eq!(me.status(), StatusCode::OK);
    let me_body: MeResponse = me.json().await.expect("me json");
    assert_eq!(me_body.id, login_body.id);
    assert!(me_body.roles.iter().any(|role| role == "admin"));

    let email = format!("smoke-{}@example.com", Uuid::new_v4());
    let created = client
        .post(format!("{}/api/v1/users", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .json(&json!({ "user": { "name": "Smoke", "email": email, "roles": ["user"] } }))
        .send()
        .await
        .expect("create request failed");
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: UserJson = created.json().await.expect("create json");
    assert_eq!(created.email, email);
    assert_eq!(created.roles, vec!["user".to_string()]);

    let duplicate = client
        .post(format!("{}/api/v1/users", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .json(&json!({ "user": { "email": email.to_uppercase() } }))
        .send()
        .await
        .expect("duplicate request failed");
    assert_eq!(duplicate.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let updated = client
        .patch(format!("{}/api/v1/users/{}", base_url, created.id))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .json(&json!({ "user": { "roles": ["admin"] } }))
        .send()
        .await
        .expect("update request failed");
    assert_eq!(updated.status(), StatusCode::OK);
    let updated: UserJson = updated.json().await.expect("update json");
    assert_eq!(updated.roles, vec!["admin".to_string()]);

    let index = client
        .get(format!("{}/api/v1/users", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("index request failed");
    assert_eq!(index.status(), StatusCode::OK);
    let index: UsersIndex = index.json().await.expect("index json");
    assert_eq!(index.users.first().map(|user| user.id), Some(created.id));

    let deleted = client
        .delete(format!("{}/api/v1/users/{}", base_url, created.id))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("delete request failed");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let logout = client
        .post(format!("{}/api/v1/auth/logout", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("logout request failed");
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let me_after = client
        .get(format!("{}/api/v1/me", base_url))
        .header(reqwest::header::COOKIE, sid_cookie)
        .send()
        .await
        .expect("me after logout request failed");
    assert_eq!(me_after.status(), StatusCode::UNAUTHORIZED);
}

async fn wait_for_health(client: &reqwest::Client, base_url: &str, retries: usize, delay_ms: u64) {
    let url = format!("{}/up", base_url);
    for attempt in 0..retries {
        match client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => return,
            _ => {
                if attempt + 1 >= retries {
                    panic!(
                        "service not ready after {} attempts (base_url={})",
                        retries, base_url
                    );
                }
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn extract_sid_cookie(response: &reqwest::Response) -> String {
    let header = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let first = header.split(';').next().unwrap_or("");
    if !first.starts_with("sid=") {
        panic!("missing sid cookie in response: {}", header);
    }
    first.to_string()
}
