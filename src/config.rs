#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            "test" => AppEnv::Test,
            _ => AppEnv::Development,
        }
    }
}

#[derive(Clone)]
pub struct KeycloakConfig {
    pub site_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

impl KeycloakConfig {
    fn realm_base(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect",
            self.site_url.trim_end_matches('/'),
            self.realm
        )
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/auth", self.realm_base())
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.realm_base())
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.realm_base())
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub app_env: AppEnv,
    pub redis_url: Option<String>,
    pub session_ttl_seconds: u64,
    pub session_key_prefix: String,
    pub cookie_secure: bool,
    pub cookie_domain: Option<String>,

    // Federated login is enabled only when site, realm and client id are all present.
    pub keycloak: Option<KeycloakConfig>,

    pub dev_admin_email: String,
    pub dev_admin_password: String,
}
