pub mod keycloak;
pub mod password;
