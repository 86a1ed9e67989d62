/// Access Token Generation and Validation
///
/// Access tokens are stateless: signature, issuer and expiry are all that is
/// checked, so no database round trip is needed to authenticate a request.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::AccessClaims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::User;

/// Generate a new access token for a user
///
/// # Errors
/// Returns an internal error if signing fails
pub fn generate_access_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = AccessClaims::new(user, config.access_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Access token generation failed: {}", e)))
}

/// Validate and extract claims from an access token
///
/// # Errors
/// Returns `TokenExpired` for an expired token, `TokenInvalid` otherwise
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Access token validation error: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        }
    })
}
