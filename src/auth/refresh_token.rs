/// Refresh Token Generation and Verification
///
/// Refresh tokens are signed JWTs with their own secret and a longer expiry.
/// A verified signature is necessary but not sufficient: the session
/// controller also requires the token to equal the one stored on the user
/// record, which is what makes rotation and logout effective.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::RefreshClaims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a new refresh token embedding only the user id
///
/// # Errors
/// Returns an internal error if signing fails
pub fn generate_refresh_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(user_id, config.refresh_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Refresh token generation failed: {}", e)))
}

/// Verify a refresh token's signature, issuer and expiry
///
/// # Returns
/// The claims embedded in the token if it verifies
///
/// # Errors
/// `TokenExpired` if past its expiry, `TokenInvalid` for anything else
pub fn validate_refresh_token(token: &str, config: &JwtSettings) -> Result<RefreshClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => {
            tracing::info!("Refresh token expired");
            AuthError::TokenExpired
        }
        _ => {
            tracing::warn!("Refresh token validation error: {}", e);
            AuthError::TokenInvalid
        }
    })
}
