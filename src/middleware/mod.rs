/// Middleware module
///
/// Custom middleware for authentication and request logging.

mod auth_middleware;

pub use auth_middleware::AuthMiddleware;
