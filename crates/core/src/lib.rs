//! Core library for the CredMate API
//!
//! This crate contains the identity and session token logic:
//! - Stable user ID derivation
//! - Session token issuing and verification
//! - Identity provider verification
//! - User directory storage
//! - The session service tying them together

pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod stable_id;
pub mod token;
pub mod user;

pub use config::{ConfigError, SessionConfig};
pub use error::{AuthError, Recovery};
pub use session::{AuthStage, SessionService};
pub type Result<T> = std::result::Result<T, AuthError>;
