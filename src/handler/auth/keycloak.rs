use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    config::{Config, KeycloakConfig},
    error::AppError,
    handler::{
        session::{expired_cookie, session_cookie, short_lived_cookie},
        users::UserJson,
    },
    service::{identity::ExternalIdentity, users::UserWithRoles},
    state::AppState,
};

const PROVIDER: &str = "keycloak";
const STATE_COOKIE: &str = "oauth_state";

#[derive(Deserialize)]
pub struct KeycloakCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn into_identity(self) -> Result<ExternalIdentity, AppError> {
        let Some(email) = self.email.filter(|email| !email.trim().is_empty()) else {
            return Err(AppError::BadRequest(
                "Authentication failed: provider returned no email".to_string(),
            ));
        };
        Ok(ExternalIdentity {
            provider: PROVIDER.to_string(),
            external_id: self.sub,
            email,
            name: self.name,
            avatar_url: self.picture,
        })
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/keycloak", get(start_keycloak_auth))
        .route("/api/v1/auth/keycloak/callback", get(keycloak_callback))
        .with_state(state)
}

fn keycloak_config(values: &Config) -> Result<(KeycloakConfig, String), AppError> {
    let Some(config) = values.keycloak.clone() else {
        return Err(AppError::Config(
            "KEYCLOAK_SITE_URL, KEYCLOAK_REALM and KEYCLOAK_CLIENT_ID must be set".to_string(),
        ));
    };
    let Some(redirect_url) = config.redirect_url.clone() else {
        return Err(AppError::Config("KEYCLOAK_REDIRECT_URL is not set".to_string()));
    };
    Ok((config, redirect_url))
}

fn authorize_redirect(config: &KeycloakConfig, redirect_url: &str, state: &str) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope=openid%20email%20profile&state={}",
        config.authorize_url(),
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_url),
        urlencoding::encode(state)
    )
}

/// The `state` echoed by the provider must equal the one stored in the cookie.
fn verify_state(stored: Option<&str>, returned: Option<&str>) -> Result<(), AppError> {
    match (stored, returned) {
        (Some(stored), Some(returned)) if stored == returned => Ok(()),
        _ => Err(AppError::BadRequest(
            "Authentication failed: state mismatch".to_string(),
        )),
    }
}

fn failure_message(error: &str, description: Option<&str>) -> String {
    match description {
        Some(desc) => format!("Authentication failed: {} ({})", error, desc),
        None => format!("Authentication failed: {}", error),
    }
}

async fn start_keycloak_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let (config, redirect_url) = keycloak_config(state.config().values())?;
    let csrf = state.secrets().generate(24);
    let url = authorize_redirect(&config, &redirect_url, &csrf);

    let jar = jar.add(short_lived_cookie(state.config().values(), STATE_COOKIE, csrf));
    Ok((jar, Redirect::temporary(&url)).into_response())
}

async fn fetch_identity(
    config: &KeycloakConfig,
    redirect_url: &str,
    code: &str,
) -> Result<ExternalIdentity, AppError> {
    let client = reqwest::Client::new();
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("code", code),
        ("redirect_uri", redirect_url),
    ];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret", secret.as_str()));
    }

    let token = client
        .post(config.token_url())
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| AppError::Upstream(format!("token request failed: {}", err)))?
        .json::<TokenResponse>()
        .await
        .map_err(|err| AppError::Upstream(format!("token response parse failed: {}", err)))?;

    let user_info = client
        .get(config.userinfo_url())
        .bearer_auth(&token.access_token)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| AppError::Upstream(format!("userinfo request failed: {}", err)))?
        .json::<UserInfo>()
        .await
        .map_err(|err| AppError::Upstream(format!("userinfo response parse failed: {}", err)))?;

    user_info.into_identity()
}

async fn keycloak_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<KeycloakCallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "keycloak returned an error");
        return Err(AppError::BadRequest(failure_message(
            &error,
            query.error_description.as_deref(),
        )));
    }

    let Some(code) = query.code else {
        return Err(AppError::BadRequest("Authentication failed: missing code".to_string()));
    };
    verify_state(
        jar.get(STATE_COOKIE).map(|cookie| cookie.value()),
        query.state.as_deref(),
    )?;

    let (config, redirect_url) = keycloak_config(state.config().values())?;
    let identity = fetch_identity(&config, &redirect_url, &code).await?;
    let login = state.auth().login_federated(&identity).await?;
    let roles = state.roles().role_names(login.user.id).await?;

    let values = state.config().values();
    let jar = jar
        .add(expired_cookie(values, STATE_COOKIE))
        .add(session_cookie(values, login.session_id));
    let body = UserJson::summary(UserWithRoles {
        user: login.user,
        roles,
    });
    Ok((StatusCode::OK, jar, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KeycloakConfig {
        KeycloakConfig {
            site_url: "https://sso.example.com".to_string(),
            realm: "staff".to_string(),
            client_id: "admin portal".to_string(),
            client_secret: None,
            redirect_url: None,
        }
    }

    #[test]
    fn authorize_redirect_encodes_parameters() {
        let url = authorize_redirect(&config(), "http://localhost:3333/cb?x=1", "st8");
        assert!(url.starts_with(
            "https://sso.example.com/realms/staff/protocol/openid-connect/auth?response_type=code"
        ));
        assert!(url.contains("client_id=admin%20portal"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3333%2Fcb%3Fx%3D1"));
        assert!(url.ends_with("&state=st8"));
    }

    #[test]
    fn userinfo_maps_to_keycloak_identity() {
        let info: UserInfo = serde_json::from_str(
            r#"{"sub":"abc","email":"a@x.com","name":"Ann","preferred_username":"ann"}"#,
        )
        .unwrap();
        let identity = info.into_identity().expect("identity");
        assert_eq!(identity.provider, "keycloak");
        assert_eq!(identity.external_id, "abc");
        assert_eq!(identity.name.as_deref(), Some("Ann"));
        assert_eq!(identity.avatar_url, None);
    }

    #[test]
    fn userinfo_without_email_is_rejected() {
        let info: UserInfo = serde_json::from_str(r#"{"sub":"abc"}"#).unwrap();
        let err = info.into_identity().expect_err("no email");
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn state_must_match_cookie() {
        let missing_cookie = verify_state(None, Some("st8")).expect_err("no cookie");
        assert_eq!(missing_cookie.status(), StatusCode::BAD_REQUEST);

        let mismatched = verify_state(Some("st8"), Some("other")).expect_err("mismatch");
        assert_eq!(mismatched.code(), "bad_request");

        assert!(verify_state(Some("st8"), None).is_err());
        assert!(verify_state(Some("st8"), Some("st8")).is_ok());
    }

    #[test]
    fn missing_keycloak_config_is_a_server_error() {
        use crate::service::config::{ConfigService, ConfigServiceImpl};

        let unconfigured = ConfigServiceImpl::from_lookup(|_| None);
        let Err(err) = keycloak_config(unconfigured.values()) else {
            panic!("expected missing keycloak config");
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let no_redirect = ConfigServiceImpl::from_lookup(|key| match key {
            "KEYCLOAK_SITE_URL" => Some("https://sso".to_string()),
            "KEYCLOAK_REALM" => Some("staff".to_string()),
            "KEYCLOAK_CLIENT_ID" => Some("admin".to_string()),
            _ => None,
        });
        let Err(err) = keycloak_config(no_redirect.values()) else {
            panic!("expected missing redirect url");
        };
        assert_eq!(err.code(), "config_error");

        let configured = ConfigServiceImpl::from_lookup(|key| match key {
            "KEYCLOAK_SITE_URL" => Some("https://sso".to_string()),
            "KEYCLOAK_REALM" => Some("staff".to_string()),
            "KEYCLOAK_CLIENT_ID" => Some("admin".to_string()),
            "KEYCLOAK_REDIRECT_URL" => Some("http://localhost:3333/cb".to_string()),
            _ => None,
        });
        let Ok((_, redirect_url)) = keycloak_config(configured.values()) else {
            panic!("expected keycloak config");
        };
        assert_eq!(redirect_url, "http://localhost:3333/cb");
    }

    #[test]
    fn failure_message_includes_description() {
        assert_eq!(
            failure_message("access_denied", Some("user cancelled")),
            "Authentication failed: access_denied (user cancelled)"
        );
        assert_eq!(
            failure_message("access_denied", None),
            "Authentication failed: access_denied"
        );
    }
}
