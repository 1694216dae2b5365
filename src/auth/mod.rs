//! Authentication: JWT handling and the axum middleware protecting the
//! game routes.

pub mod jwt;
pub mod middleware;

pub use jwt::{JwtHandler, TokenPair};
pub use middleware::{auth_middleware, AuthedUser};
