pub mod auth;
pub mod config;
pub mod credentials;
pub mod identity;
pub mod policy;
pub mod roles;
pub mod secret;
pub mod seed;
pub mod session;
pub mod users;
