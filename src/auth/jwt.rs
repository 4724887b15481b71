/// Token codec
///
/// Creates and verifies the two token kinds over their two signing domains.
/// Signature and expiry checks are delegated to `jsonwebtoken`; the kind
/// check is an explicit post-verification rule. Verification failures are
/// reported with their specific cause (`TokenError`) so callers can log it,
/// but the cause must never reach the client - the API boundary collapses
/// everything into a single "invalid token" answer.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{AccessClaims, RefreshClaims, TokenKind};
use crate::configuration::JwtSettings;
use crate::domain::UserView;
use crate::error::AppError;

/// Internal verification failure. Logged, never serialized to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Structurally valid token of the wrong kind
    InvalidKind,
    /// Signature valid but past expiry
    Expired,
    /// Signature check failed
    BadSignature,
    /// Not a parseable token, or issuer/required-claim mismatch
    Malformed,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidKind => write!(f, "invalid token kind"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::BadSignature => write!(f, "bad signature"),
            TokenError::Malformed => write!(f, "malformed token"),
        }
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}

fn validation_for(config: &JwtSettings) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation
}

/// Issues a short-lived access token carrying the user's current role
/// snapshot, signed with the access secret.
pub fn issue_access_token(user: &UserView, config: &JwtSettings) -> Result<String, AppError> {
    let claims = AccessClaims::new(user, config.access_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Access token generation failed: {}", e)))
}

/// Issues a long-lived refresh token (id and email only), signed with the
/// refresh secret.
pub fn issue_refresh_token(user: &UserView, config: &JwtSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(user, config.refresh_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Refresh token generation failed: {}", e)))
}

/// Verifies signature, expiry and issuer against the access secret, then
/// enforces kind = access.
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, TokenError> {
    let claims = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation_for(config),
    )
    .map(|data| data.claims)
    .map_err(map_decode_error)?;

    if claims.kind != TokenKind::Access {
        return Err(TokenError::InvalidKind);
    }

    Ok(claims)
}

/// Verifies signature, expiry and issuer against the refresh secret, then
/// enforces kind = refresh.
pub fn verify_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, TokenError> {
    let claims = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &validation_for(config),
    )
    .map(|data| data.claims)
    .map_err(map_decode_error)?;

    if claims.kind != TokenKind::Refresh {
        return Err(TokenError::InvalidKind);
    }

    Ok(claims)
}
