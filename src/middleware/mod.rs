pub mod active_profile;
pub mod auth;
pub mod response;

pub use active_profile::active_profile_middleware;
pub use auth::{jwt_auth_middleware, AuthParent};
pub use response::{ApiResponse, ApiResult};
