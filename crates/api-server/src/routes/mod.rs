pub mod auth;
pub mod error;
pub mod health;
pub mod json;
pub mod user;
