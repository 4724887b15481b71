/// Session manager
///
/// Orchestrates login and refresh on top of the credential verifier and the
/// token codec. Owns two rules the codec cannot express:
/// - unknown email and wrong password are indistinguishable to the caller,
/// - the role claim of a new access token always comes from a freshly loaded
///   user aggregate, never from anything cached or embedded in the refresh
///   token. A family/role change therefore becomes visible to the client on
///   the next refresh, bounded by the access token lifetime.

use serde::Serialize;
use sqlx::PgPool;

use crate::auth::jwt::{issue_access_token, issue_refresh_token, verify_refresh_token};
use crate::auth::password::verify_password;
use crate::configuration::JwtSettings;
use crate::domain::{UserView, UserWithSecret};
use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login/refresh result: a fresh token pair plus the user snapshot the
/// access claims were derived from.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub tokens: TokenPair,
    pub user: UserView,
}

/// Builds a token pair for a loaded user aggregate. Access claims snapshot
/// the current role; refresh claims carry id and email only.
pub fn issue_tokens(user: UserView, config: &JwtSettings) -> Result<LoginResponse, AppError> {
    let access_token = issue_access_token(&user, config)?;
    let refresh_token = issue_refresh_token(&user, config)?;

    Ok(LoginResponse {
        tokens: TokenPair {
            access_token,
            refresh_token,
        },
        user,
    })
}

/// Authenticates an email/password pair and issues a token pair.
///
/// Unknown email and wrong password both answer `InvalidCredentials`, so the
/// endpoint cannot be used to enumerate accounts.
pub async fn login(
    pool: &PgPool,
    config: &JwtSettings,
    email: &str,
    password: &str,
) -> Result<LoginResponse, AppError> {
    let record = UserWithSecret::find_by_email(pool, email).await?;

    let record = match record {
        Some(record) => record,
        None => {
            tracing::warn!(email = %email, "Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !verify_password(password, &record.password_hash)? {
        tracing::warn!(user_id = %record.user.id, "Login attempt with wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    tracing::info!(user_id = %record.user.id, "User logged in");
    issue_tokens(record.user, config)
}

/// Exchanges a refresh token for a new token pair.
///
/// Verification failures (expiry, signature, kind, garbage) all collapse to
/// `InvalidRefreshToken`; the cause is only logged. Verification runs before
/// the user lookup, so an expired token answers `InvalidRefreshToken` even
/// when the user is also gone. The user is re-fetched by id so the new
/// access token reflects the current membership role.
pub async fn refresh(
    pool: &PgPool,
    config: &JwtSettings,
    refresh_token: &str,
) -> Result<LoginResponse, AppError> {
    let claims = verify_refresh_token(refresh_token, config).map_err(|cause| {
        tracing::warn!(cause = %cause, "Refresh token verification failed");
        AppError::Auth(AuthError::InvalidRefreshToken)
    })?;

    let user_id = claims.user_id().map_err(|_| {
        tracing::warn!("Refresh token subject is not a valid user id");
        AppError::Auth(AuthError::InvalidRefreshToken)
    })?;

    let user = match UserView::find_by_id(pool, user_id).await? {
        Some(user) => user,
        None => {
            tracing::warn!(user_id = %user_id, "Refresh for deleted user");
            return Err(AuthError::UserNotFound.into());
        }
    };

    tracing::info!(user_id = %user.id, "Token refreshed");
    issue_tokens(user, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::verify_access_token;
    use crate::domain::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "test-access-secret-at-least-32-chars-long".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-chars-lo".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 1_209_600,
            issuer: "test".to_string(),
        }
    }

    fn test_user(role: Option<Role>) -> UserView {
        UserView {
            id: Uuid::new_v4(),
            email: "chef@example.com".to_string(),
            username: "chef".to_string(),
            role,
            family_id: role.map(|_| 42),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_access_token_snapshots_current_role() {
        let config = get_test_config();
        let user = test_user(Some(Role::Chef));

        let response = issue_tokens(user, &config).unwrap();
        let claims = verify_access_token(&response.tokens.access_token, &config).unwrap();

        assert_eq!(claims.role, Some(Role::Chef));
        assert_eq!(response.user.role, Some(Role::Chef));
    }

    #[test]
    fn issued_pair_uses_both_signing_domains() {
        let config = get_test_config();
        let response = issue_tokens(test_user(None), &config).unwrap();

        assert!(verify_access_token(&response.tokens.access_token, &config).is_ok());
        assert!(verify_refresh_token(&response.tokens.refresh_token, &config).is_ok());
        // Cross-kind replay fails both ways
        assert!(verify_access_token(&response.tokens.refresh_token, &config).is_err());
        assert!(verify_refresh_token(&response.tokens.access_token, &config).is_err());
    }
}
