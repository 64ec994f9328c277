//! Request authentication for protected routes.

mod bearer;

pub use bearer::AuthenticatedUser;
