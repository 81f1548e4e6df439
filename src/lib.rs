pub mod api;
pub mod auth;
pub mod cache;
pub mod store;
pub mod timesheet;
pub mod week;

pub use auth::{CredentialStore, HashedCredentials};
pub use timesheet::Timesheet;
