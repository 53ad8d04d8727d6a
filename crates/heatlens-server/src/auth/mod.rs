pub mod api_keys;
pub mod middleware;

pub use middleware::{require_auth, AuthContext};
