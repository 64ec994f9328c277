//! User module
//!
//! This module contains user records and the directory that stores them.

mod directory;
mod file_store;
mod model;

pub use directory::{DirectoryError, DirectoryResult, UserDirectory};
pub use file_store::FileUserDirectory;
pub use model::*;
