/// Input validators for the account routes
///
/// Registration needs all four identity fields present and non-blank.
/// Login needs at least one identifier. Values are returned trimmed;
/// passwords are checked for blankness but never altered.

use crate::error::ValidationError;

/// Trimmed registration fields
#[derive(Debug, PartialEq)]
pub struct RequiredFields {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Returns the trimmed value, or `None` if absent or whitespace-only
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validates that every registration field is present and non-blank.
///
/// `username` is lower-cased, matching how it is stored.
pub fn require_registration_fields(
    fullname: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
    username: Option<&str>,
) -> Result<RequiredFields, ValidationError> {
    match (
        non_blank(fullname),
        non_blank(email),
        non_blank(password),
        non_blank(username),
    ) {
        (Some(fullname), Some(email), Some(_), Some(username)) => Ok(RequiredFields {
            fullname: fullname.to_string(),
            email: email.to_string(),
            username: username.to_lowercase(),
            // checked above, kept verbatim
            password: password.unwrap_or_default().to_string(),
        }),
        _ => Err(ValidationError::RequiredFields),
    }
}

/// Login identifier: at least one of username / email
#[derive(Debug, PartialEq)]
pub struct Identifier {
    pub username: Option<String>,
    pub email: Option<String>,
}

pub fn require_identifier(
    username: Option<&str>,
    email: Option<&str>,
) -> Result<Identifier, ValidationError> {
    let username = non_blank(username).map(str::to_lowercase);
    let email = non_blank(email).map(str::to_string);

    if username.is_none() && email.is_none() {
        return Err(ValidationError::MissingIdentifier);
    }
    Ok(Identifier { username, email })
}
