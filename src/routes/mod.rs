mod admin;
mod health_check;

pub use admin::{login, logout, profile, refresh_token, revoke_token, verify_token};
pub use health_check::health_check;
