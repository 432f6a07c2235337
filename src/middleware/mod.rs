/// Middleware module
///
/// Request guards for the admin surface.

mod admin_guard;

pub use admin_guard::{bearer_token, AdminGuard, Privilege};
