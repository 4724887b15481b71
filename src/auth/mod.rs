/// Authentication module
///
/// Token codec (two signing domains), session management, password hashing
/// and the role guard.

mod claims;
mod guard;
mod jwt;
mod password;
mod session;

pub use claims::{AccessClaims, AuthenticatedUser, RefreshClaims, TokenKind};
pub use guard::require_role;
pub use jwt::{issue_access_token, issue_refresh_token, verify_access_token, verify_refresh_token};
pub use jwt::TokenError;
pub use password::{hash_password, verify_password};
pub use session::{issue_tokens, login, refresh, LoginResponse, TokenPair};
