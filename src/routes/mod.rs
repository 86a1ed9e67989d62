mod health_check;
mod users;

pub use health_check::health_check;
pub use users::{current_user, login, logout, refresh, register};
pub use users::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

use actix_web::web;

use crate::error::{AppError, ValidationError};

/// JSON extractor config: malformed bodies become a 400 in the usual envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| {
            tracing::warn!("Rejected request body: {}", err);
            AppError::Validation(ValidationError::InvalidFormat("request body".to_string())).into()
        })
}
