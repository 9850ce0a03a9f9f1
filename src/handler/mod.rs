pub mod auth;
pub mod dashboard;
pub mod dev;
pub mod health;
pub mod session;
pub mod users;
