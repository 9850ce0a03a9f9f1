use std::{env, sync::Arc};

use crate::config::{AppEnv, Config, KeycloakConfig};

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn nonempty(&self, key: &str) -> Option<String> {
        (self.lookup)(key).and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            let normalized = Self::strip_wrapping_quotes(trimmed).trim();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized.to_string())
            }
        })
    }

    fn u16(&self, key: &str) -> Option<u16> {
        self.nonempty(key).and_then(|value| value.parse::<u16>().ok())
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.nonempty(key).and_then(|value| value.parse::<u64>().ok())
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.nonempty(key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }
}

impl ConfigServiceImpl {
    pub fn new() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let port = env.u16("PORT").unwrap_or(3333);
        let app_env = env
            .nonempty("APP_ENV")
            .map(|value| AppEnv::parse(&value))
            .unwrap_or(AppEnv::Development);
        let redis_url = env.nonempty("REDIS_URL");
        let session_ttl_seconds = env.u64("SESSION_TTL_SECONDS").unwrap_or(60 * 60 * 24 * 7);
        let session_key_prefix = env
            .nonempty("SESSION_KEY_PREFIX")
            .unwrap_or_else(|| "account-admin".to_string());
        let cookie_secure = env.bool("COOKIE_SECURE", false);
        let cookie_domain = env.nonempty("COOKIE_DOMAIN");

        let keycloak = match (
            env.nonempty("KEYCLOAK_SITE_URL"),
            env.nonempty("KEYCLOAK_REALM"),
            env.nonempty("KEYCLOAK_CLIENT_ID"),
        ) {
            (Some(site_url), Some(realm), Some(client_id)) => Some(KeycloakConfig {
                site_url,
                realm,
                client_id,
                client_secret: env.nonempty("KEYCLOAK_CLIENT_SECRET"),
                redirect_url: env.nonempty("KEYCLOAK_REDIRECT_URL"),
            }),
            _ => None,
        };

        let dev_admin_email = env
            .nonempty("DEV_ADMIN_EMAIL")
            .unwrap_or_else(|| "admin@example.com".to_string());
        let dev_admin_password = env
            .nonempty("DEV_ADMIN_PASSWORD")
            .unwrap_or_else(|| "password123".to_string());

        Self {
            config: Arc::new(Config {
                port,
                app_env,
                redis_url,
                session_ttl_seconds,
                session_key_prefix,
                cookie_secure,
                cookie_domain,
                keycloak,
                dev_admin_email,
                dev_admin_password,
            }),
        }
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ConfigServiceImpl {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigServiceImpl::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = config_from(&[]);
        let values = config.values();
        assert_eq!(config.port(), 3333);
        assert_eq!(values.app_env, AppEnv::Development);
        assert_eq!(values.session_ttl_seconds, 604_800);
        assert_eq!(values.session_key_prefix, "account-admin");
        assert!(values.keycloak.is_none());
        assert_eq!(values.dev_admin_email, "admin@example.com");
    }

    #[test]
    fn quoted_and_blank_values_are_normalized() {
        let config = config_from(&[
            ("PORT", " \"4000\" "),
            ("COOKIE_DOMAIN", "''"),
            ("COOKIE_SECURE", "TRUE"),
            ("APP_ENV", "production"),
        ]);
        let values = config.values();
        assert_eq!(values.port, 4000);
        assert!(values.cookie_domain.is_none());
        assert!(values.cookie_secure);
        assert_eq!(values.app_env, AppEnv::Production);
    }

    #[test]
    fn keycloak_requires_site_realm_and_client() {
        let partial = config_from(&[
            ("KEYCLOAK_SITE_URL", "https://sso.example.com"),
            ("KEYCLOAK_REALM", "staff"),
        ]);
        assert!(partial.values().keycloak.is_none());

        let full = config_from(&[
            ("KEYCLOAK_SITE_URL", "https://sso.example.com/"),
            ("KEYCLOAK_REALM", "staff"),
            ("KEYCLOAK_CLIENT_ID", "admin-portal"),
        ]);
        let keycloak = full.values().keycloak.clone().expect("keycloak config");
        assert_eq!(
            keycloak.token_url(),
            "https://sso.example.com/realms/staff/protocol/openid-connect/token"
        );
        assert!(keycloak.client_secret.is_none());
    }
}
