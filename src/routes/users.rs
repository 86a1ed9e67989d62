/// Account Routes
///
/// HTTP binding for the session controller: request bodies, cookies and the
/// response envelope. All session rules live in `SessionController`.

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AccessClaims;
use crate::envelope::ApiResponse;
use crate::error::AppError;
use crate::session::{LoginForm, RegisterForm, SessionController, TokenPair};
use crate::store::PublicUser;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Registration request; `avatar` / `coverImage` are staged file names
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

impl From<RegisterRequest> for RegisterForm {
    fn from(req: RegisterRequest) -> Self {
        Self {
            fullname: req.fullname,
            email: req.email,
            password: req.password,
            username: req.username,
            avatar: req.avatar,
            cover_image: req.cover_image,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl From<LoginRequest> for LoginForm {
    fn from(req: LoginRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// `HttpOnly`, `Secure` cookie scoped to the whole site
fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(true)
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

fn with_session_cookies(status: StatusCode, tokens: &TokenPair) -> actix_web::HttpResponseBuilder {
    let mut builder = HttpResponse::build(status);
    builder
        .cookie(session_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .cookie(session_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()));
    builder
}

/// POST /api/v1/users/register
///
/// # Errors
/// - 400: a required field is blank, or the avatar is missing / failed to upload
/// - 409: username or email already registered
/// - 500: store, hashing or media failure
pub async fn register(
    body: web::Json<RegisterRequest>,
    controller: web::Data<SessionController>,
) -> Result<HttpResponse, AppError> {
    let user = controller.register(body.into_inner().into()).await?;

    Ok(HttpResponse::Created().json(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    )))
}

/// POST /api/v1/users/login
///
/// Returns the user and both tokens in the body and sets them as cookies.
///
/// # Errors
/// - 400: neither username nor email supplied
/// - 404: no such user
/// - 401: wrong password
pub async fn login(
    body: web::Json<LoginRequest>,
    controller: web::Data<SessionController>,
) -> Result<HttpResponse, AppError> {
    let outcome = controller.login(body.into_inner().into()).await?;

    Ok(with_session_cookies(StatusCode::OK, &outcome.tokens).json(ApiResponse::new(
        StatusCode::OK,
        LoginResponse {
            user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        },
        "User logged in successfully",
    )))
}

/// POST /api/v1/users/logout
///
/// **Requires a valid access token.** Clears the stored session and both cookies.
pub async fn logout(
    claims: web::ReqData<AccessClaims>,
    controller: web::Data<SessionController>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    controller.logout(user_id).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE))
        .json(ApiResponse::new(
            StatusCode::OK,
            serde_json::json!({}),
            "User logged out",
        )))
}

/// POST /api/v1/users/refresh-token
///
/// The refresh token is read from the `refreshToken` cookie, falling back to
/// the `refreshToken` body field. Every failure is a 401 with a reason.
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    controller: web::Data<SessionController>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token));

    let tokens = controller.refresh(presented.as_deref()).await?;

    Ok(with_session_cookies(StatusCode::OK, &tokens).json(ApiResponse::new(
        StatusCode::OK,
        TokenResponse {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        },
        "Access token refreshed",
    )))
}

/// GET /api/v1/users/current-user
///
/// **Requires a valid access token.**
pub async fn current_user(
    claims: web::ReqData<AccessClaims>,
    controller: web::Data<SessionController>,
) -> Result<HttpResponse, AppError> {
    let user = controller.current_user(claims.user_id()?).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        StatusCode::OK,
        user,
        "Current user fetched successfully",
    )))
}
