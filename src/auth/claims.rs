/// JWT claims structures
///
/// The two token kinds are a closed pair of claim types with an explicit
/// `type` discriminator, so every verification site has to branch on the
/// kind. Access claims carry a role snapshot taken at issuance; refresh
/// claims deliberately carry no role, so they stay valid across role changes
/// and the role is re-derived from storage at refresh time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Role, UserView};
use crate::error::AppError;

/// Token kind discriminator embedded in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

/// Claims of a short-lived access token (signed with the access secret).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// User email
    pub email: String,
    /// Role snapshot at issuance; null when the user has no family
    pub role: Option<Role>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

/// Claims of a long-lived refresh token (signed with the refresh secret).
/// No role: only id and email identify the subject.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user: &UserView, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            kind: TokenKind::Access,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Internal("Invalid user ID in token".to_string()))
    }
}

impl RefreshClaims {
    pub fn new(user: &UserView, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            kind: TokenKind::Refresh,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Internal("Invalid user ID in token".to_string()))
    }
}

/// Request-scoped identity, rebuilt on every access-token verification and
/// injected into request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Option<Role>,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: &AccessClaims) -> Result<Self, AppError> {
        Ok(Self {
            id: claims.user_id()?,
            email: claims.email.clone(),
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(role: Option<Role>) -> UserView {
        UserView {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            username: "test".to_string(),
            role,
            family_id: role.map(|_| 1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn access_claims_carry_role_snapshot() {
        let user = test_user(Some(Role::Chef));
        let claims = AccessClaims::new(&user, 900, "test".to_string());

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Some(Role::Chef));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn access_role_is_null_without_membership() {
        let user = test_user(None);
        let claims = AccessClaims::new(&user, 900, "test".to_string());
        let json = serde_json::to_value(&claims).unwrap();

        assert!(json["role"].is_null());
        assert_eq!(json["type"], "access_token");
    }

    #[test]
    fn refresh_claims_have_no_role_field() {
        let user = test_user(Some(Role::Member));
        let claims = RefreshClaims::new(&user, 1_209_600, "test".to_string());
        let json = serde_json::to_value(&claims).unwrap();

        assert!(json.get("role").is_none());
        assert_eq!(json["type"], "refresh_token");
    }

    #[test]
    fn user_id_extraction() {
        let user = test_user(None);
        let claims = AccessClaims::new(&user, 900, "test".to_string());

        assert_eq!(claims.user_id().unwrap(), user.id);
    }

    #[test]
    fn invalid_user_id_is_rejected() {
        let user = test_user(None);
        let mut claims = AccessClaims::new(&user, 900, "test".to_string());
        claims.sub = "not-a-uuid".to_string();

        assert!(claims.user_id().is_err());
    }
}
