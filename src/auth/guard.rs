/// Role guard
///
/// Request-time authorization, independent of token verification. Pure set
/// membership over the closed role enum: no hierarchy, CHEF does not imply
/// MEMBER or vice versa.

use crate::auth::claims::AuthenticatedUser;
use crate::domain::Role;
use crate::error::{AppError, AuthError};

/// Checks the caller's role claim against a route's required-role set.
///
/// An empty `required` set authorizes any caller, even an absent one
/// (public-to-authenticated routes). Otherwise the caller must be present,
/// carry a role, and that role must be in the set; anything else fails with
/// `InsufficientPermissions`.
pub fn require_role(
    required: &[Role],
    identity: Option<&AuthenticatedUser>,
) -> Result<(), AppError> {
    if required.is_empty() {
        return Ok(());
    }

    match identity.and_then(|user| user.role) {
        Some(role) if required.contains(&role) => Ok(()),
        _ => Err(AuthError::InsufficientPermissions.into()),
    }
}
