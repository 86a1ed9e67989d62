/// Authentication module
///
/// Token issuing (access and refresh JWTs with independent secrets) and
/// password hashing.

mod jwt;
mod password;
mod claims;
mod refresh_token;

pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::hash_password;
pub use password::verify_password;
pub use claims::{AccessClaims, RefreshClaims};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::validate_refresh_token;

#[cfg(test)]
pub(crate) fn test_settings() -> crate::configuration::JwtSettings {
    crate::configuration::JwtSettings {
        access_token_secret: "test-access-secret-at-least-32-characters".to_string(),
        access_token_expiry: 3600,
        refresh_token_secret: "test-refresh-secret-at-least-32-characters".to_string(),
        refresh_token_expiry: 604800,
        issuer: "test".to_string(),
    }
}
