/// Session Controller
///
/// Orchestrates register / login / logout / refresh. The stored
/// `refresh_token` on each user is the single active session pointer:
/// login overwrites it, refresh rotates it with a compare-and-swap, and
/// logout clears it. A refresh token is accepted only if it verifies AND
/// equals the stored value, so a rotated-out or logged-out token is dead
/// even while its signature is still valid.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    generate_access_token, generate_refresh_token, hash_password, validate_refresh_token,
    verify_password,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::media::MediaHost;
use crate::store::{CredentialStore, NewUser, PublicUser, User};
use crate::validators::{non_blank, require_identifier, require_registration_fields};

/// Registration input; `avatar` and `cover_image` name files in the staging directory
#[derive(Debug, Default, Clone)]
pub struct RegisterForm {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct LoginForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    media: Arc<dyn MediaHost>,
    jwt: JwtSettings,
}

impl SessionController {
    pub fn new(store: Arc<dyn CredentialStore>, media: Arc<dyn MediaHost>, jwt: JwtSettings) -> Self {
        Self { store, media, jwt }
    }

    /// Create a user record.
    ///
    /// Staged files are removed when registration fails, whichever step failed.
    ///
    /// # Errors
    /// - `Validation` if a field is blank, or the avatar is missing or fails to upload
    /// - `Conflict` if the username or email is taken, including a lost race on create
    /// - `Media` if a supplied cover image fails to upload
    /// - `Internal` if the created record cannot be read back
    pub async fn register(&self, form: RegisterForm) -> Result<PublicUser, AppError> {
        let staged: Vec<String> = [form.avatar.as_deref(), form.cover_image.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .map(str::to_string)
            .collect();

        let result = self.create_account(form).await;
        if result.is_err() {
            for name in &staged {
                self.media.discard(name).await;
            }
        }
        result
    }

    async fn create_account(&self, form: RegisterForm) -> Result<PublicUser, AppError> {
        let context = ErrorContext::new("user_registration");

        let fields = require_registration_fields(
            form.fullname.as_deref(),
            form.email.as_deref(),
            form.password.as_deref(),
            form.username.as_deref(),
        )?;

        if self
            .store
            .find_by_username_or_email(Some(&fields.username), Some(&fields.email))
            .await?
            .is_some()
        {
            return Err(conflict());
        }

        let avatar_name =
            non_blank(form.avatar.as_deref()).ok_or(ValidationError::MissingAvatar)?;
        let avatar = self.media.upload(avatar_name).await.map_err(|e| {
            tracing::warn!(operation_id = %context.operation_id, error = %e, "Avatar upload failed");
            ValidationError::MissingAvatar
        })?;

        let cover_image = match non_blank(form.cover_image.as_deref()) {
            Some(name) => self.media.upload(name).await?,
            None => String::new(),
        };

        let password_hash = hash_password(fields.password).await?;

        let created = self
            .store
            .create(NewUser {
                username: fields.username,
                email: fields.email,
                fullname: fields.fullname,
                avatar,
                cover_image,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::UniqueConstraintViolation(_) => conflict(),
                other => other.into(),
            })?;

        let user = self
            .store
            .find_by_id(created.id)
            .await?
            .ok_or_else(|| {
                AppError::Internal("Something went wrong while registering user".to_string())
            })?;

        tracing::info!(
            operation_id = %context.operation_id,
            operation = %context.operation,
            user_id = %user.id,
            "User registered successfully"
        );

        Ok(PublicUser::from(&user))
    }

    /// Verify credentials and start a new session, replacing any previous one.
    ///
    /// # Errors
    /// - `Validation` if neither username nor email is supplied
    /// - `NotFound` if no user matches
    /// - `Auth(InvalidCredentials)` if the password does not match
    pub async fn login(&self, form: LoginForm) -> Result<LoginOutcome, AppError> {
        let context = ErrorContext::new("user_login");

        let identifier = require_identifier(form.username.as_deref(), form.email.as_deref())?;

        let user = self
            .store
            .find_by_username_or_email(identifier.username.as_deref(), identifier.email.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let password = form.password.unwrap_or_default();
        if !verify_password(password, user.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.issue_pair(&user)?;
        let stored = self
            .store
            .set_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;
        if !stored {
            return Err(AppError::Internal(
                "Something went wrong while generating refresh and access token".to_string(),
            ));
        }

        tracing::info!(
            operation_id = %context.operation_id,
            operation = %context.operation,
            user_id = %user.id,
            "User logged in successfully"
        );

        Ok(LoginOutcome {
            user: PublicUser::from(&user),
            tokens,
        })
    }

    /// Clear the stored refresh token. Clearing an already-cleared session is a no-op.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let context = ErrorContext::new("user_logout");

        let matched = self.store.set_refresh_token(user_id, None).await?;

        tracing::info!(
            operation_id = %context.operation_id,
            operation = %context.operation,
            user_id = %user_id,
            matched = matched,
            "User logged out"
        );
        Ok(())
    }

    /// Exchange the current refresh token for a new pair (rotation).
    ///
    /// # Errors
    /// - `Auth(MissingToken)` if no token was presented
    /// - `Auth(TokenInvalid | TokenExpired)` if it does not verify or its user is gone
    /// - `Auth(TokenSuperseded)` if it is not the stored token, or a concurrent
    ///   refresh rotated it first
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, AppError> {
        let context = ErrorContext::new("token_refresh");

        let presented = non_blank(presented).ok_or(AuthError::MissingToken)?;
        let claims = validate_refresh_token(presented, &self.jwt)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        if user.refresh_token.as_deref() != Some(presented) {
            return Err(AuthError::TokenSuperseded.into());
        }

        let tokens = self.issue_pair(&user)?;
        let rotated = self
            .store
            .swap_refresh_token(user.id, presented, &tokens.refresh_token)
            .await?;
        if !rotated {
            return Err(AuthError::TokenSuperseded.into());
        }

        tracing::info!(
            operation_id = %context.operation_id,
            operation = %context.operation,
            user_id = %user.id,
            "Token refreshed successfully"
        );

        Ok(tokens)
    }

    /// Sanitized view of the authenticated user
    pub async fn current_user(&self, user_id: Uuid) -> Result<PublicUser, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(|user| PublicUser::from(&user))
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: generate_access_token(user, &self.jwt)?,
            refresh_token: generate_refresh_token(user.id, &self.jwt)?,
        })
    }
}

fn conflict() -> AppError {
    AppError::Conflict("User with email or username already exists".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{test_settings, validate_access_token};
    use crate::error::MediaError;
    use crate::store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Media host that "uploads" by naming a URL, and fails for names starting with `fail`
    #[derive(Default)]
    struct StubMedia {
        uploads: Mutex<Vec<String>>,
        discarded: Mutex<Vec<String>>,
    }

    impl StubMedia {
        fn discarded(&self) -> Vec<String> {
            let mut names = self.discarded.lock().unwrap().clone();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl MediaHost for StubMedia {
        async fn upload(&self, staged_name: &str) -> Result<String, MediaError> {
            if staged_name.starts_with("fail") {
                return Err(MediaError::UploadFailed("stub refused".to_string()));
            }
            self.uploads.lock().unwrap().push(staged_name.to_string());
            Ok(format!("https://media.test/{}", staged_name))
        }

        async fn discard(&self, staged_name: &str) {
            self.discarded.lock().unwrap().push(staged_name.to_string());
        }
    }

    /// Yields after every lookup so concurrent operations interleave
    /// between reading the stored token and swapping it.
    #[derive(Default)]
    struct YieldingStore {
        inner: InMemoryCredentialStore,
        lost_swaps: AtomicUsize,
    }

    #[async_trait]
    impl CredentialStore for YieldingStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
            let user = self.inner.find_by_id(id).await;
            tokio::task::yield_now().await;
            user
        }

        async fn find_by_username_or_email(
            &self,
            username: Option<&str>,
            email: Option<&str>,
        ) -> Result<Option<User>, DatabaseError> {
            self.inner.find_by_username_or_email(username, email).await
        }

        async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
            self.inner.create(user).await
        }

        async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, DatabaseError> {
            self.inner.set_refresh_token(id, token).await
        }

        async fn swap_refresh_token(
            &self,
            id: Uuid,
            expected: &str,
            replacement: &str,
        ) -> Result<bool, DatabaseError> {
            let swapped = self.inner.swap_refresh_token(id, expected, replacement).await?;
            if !swapped {
                self.lost_swaps.fetch_add(1, Ordering::SeqCst);
            }
            Ok(swapped)
        }
    }

    struct Harness {
        store: Arc<InMemoryCredentialStore>,
        media: Arc<StubMedia>,
        controller: SessionController,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryCredentialStore::new());
        let media = Arc::new(StubMedia::default());
        let controller = SessionController::new(store.clone(), media.clone(), test_settings());
        Harness {
            store,
            media,
            controller,
        }
    }

    fn ada() -> RegisterForm {
        RegisterForm {
            fullname: Some("Ada L.".to_string()),
            email: Some("ada@x.io".to_string()),
            password: Some("p1".to_string()),
            username: Some("ada".to_string()),
            avatar: Some("avatar.png".to_string()),
            cover_image: None,
        }
    }

    fn ada_login() -> LoginForm {
        LoginForm {
            username: Some("ada".to_string()),
            email: None,
            password: Some("p1".to_string()),
        }
    }

    async fn stored_token(h: &Harness, id: Uuid) -> Option<String> {
        h.store.find_by_id(id).await.unwrap().unwrap().refresh_token
    }

    #[tokio::test]
    async fn register_returns_sanitized_user() {
        let h = harness();
        let user = h.controller.register(ada()).await.expect("registration failed");

        assert_eq!(user.username, "ada");
        assert_eq!(user.avatar, "https://media.test/avatar.png");
        assert_eq!(user.cover_image, "");

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("refreshToken").is_none());

        let stored = h.store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "p1");
        assert!(stored.refresh_token.is_none());
        assert_eq!(h.store.writes(), 1);
    }

    #[tokio::test]
    async fn register_uploads_cover_image_when_supplied() {
        let h = harness();
        let mut form = ada();
        form.cover_image = Some("cover.png".to_string());

        let user = h.controller.register(form).await.unwrap();

        assert_eq!(user.cover_image, "https://media.test/cover.png");
        assert_eq!(h.media.uploads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let h = harness();
        let mut form = ada();
        form.fullname = Some("   ".to_string());

        let err = h.controller.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::RequiredFields)));
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn register_requires_avatar() {
        let h = harness();
        let mut form = ada();
        form.avatar = None;
        let err = h.controller.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::MissingAvatar)));

        let mut form = ada();
        form.avatar = Some("fail.png".to_string());
        let err = h.controller.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::MissingAvatar)));
    }

    #[tokio::test]
    async fn register_surfaces_failed_cover_upload() {
        let h = harness();
        let mut form = ada();
        form.cover_image = Some("fail-cover.png".to_string());

        let err = h.controller.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Media(_)));
        assert_eq!(h.store.writes(), 0);
    }

    #[tokio::test]
    async fn register_same_username_twice_conflicts() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();

        let mut form = ada();
        form.email = Some("other@x.io".to_string());
        let err = h.controller.register(form).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_registration_discards_staged_files() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();
        assert!(h.media.discarded().is_empty());

        let mut duplicate = ada();
        duplicate.avatar = Some("second-avatar.png".to_string());
        duplicate.cover_image = Some("second-cover.png".to_string());
        let err = h.controller.register(duplicate).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.media.discarded(), vec!["second-avatar.png", "second-cover.png"]);
    }

    #[tokio::test]
    async fn failed_avatar_upload_discards_staged_cover() {
        let h = harness();
        let mut form = ada();
        form.avatar = Some("fail.png".to_string());
        form.cover_image = Some("cover.png".to_string());

        let err = h.controller.register(form).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(ValidationError::MissingAvatar)));
        assert!(h.media.discarded().contains(&"cover.png".to_string()));
        assert!(!h.media.uploads.lock().unwrap().contains(&"cover.png".to_string()));
    }

    #[tokio::test]
    async fn missing_avatar_discards_staged_cover() {
        let h = harness();
        let mut form = ada();
        form.avatar = None;
        form.cover_image = Some("cover.png".to_string());

        h.controller.register(form).await.unwrap_err();

        assert_eq!(h.media.discarded(), vec!["cover.png"]);
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_conflict() {
        let h = harness();
        let (first, second) = tokio::join!(
            h.controller.register(ada()),
            h.controller.register(ada())
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
    }

    #[tokio::test]
    async fn login_persists_returned_refresh_token() {
        let h = harness();
        let registered = h.controller.register(ada()).await.unwrap();
        let writes_before = h.store.writes();

        let outcome = h.controller.login(ada_login()).await.expect("login failed");

        assert_eq!(outcome.user.id, registered.id);
        assert_eq!(
            stored_token(&h, registered.id).await.as_deref(),
            Some(outcome.tokens.refresh_token.as_str())
        );
        assert_eq!(h.store.writes(), writes_before + 1);

        let claims = validate_access_token(&outcome.tokens.access_token, &test_settings()).unwrap();
        assert_eq!(claims.user_id().unwrap(), registered.id);
    }

    #[tokio::test]
    async fn login_by_email() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();

        let form = LoginForm {
            username: None,
            email: Some("ada@x.io".to_string()),
            password: Some("p1".to_string()),
        };
        assert!(h.controller.login(form).await.is_ok());
    }

    #[tokio::test]
    async fn login_failures() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();

        let err = h.controller.login(LoginForm::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::MissingIdentifier)));

        let mut form = ada_login();
        form.username = Some("grace".to_string());
        let err = h.controller.login(form).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut form = ada_login();
        form.password = Some("wrong".to_string());
        let err = h.controller.login(form).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn second_login_invalidates_first_refresh_token() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();

        let first = h.controller.login(ada_login()).await.unwrap();
        let _second = h.controller.login(ada_login()).await.unwrap();

        let err = h
            .controller
            .refresh(Some(&first.tokens.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenSuperseded)));
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_replay() {
        let h = harness();
        let user = h.controller.register(ada()).await.unwrap();
        let login = h.controller.login(ada_login()).await.unwrap();

        let first = h
            .controller
            .refresh(Some(&login.tokens.refresh_token))
            .await
            .expect("first refresh failed");
        let second = h
            .controller
            .refresh(Some(&first.refresh_token))
            .await
            .expect("second refresh failed");

        assert_eq!(stored_token(&h, user.id).await, Some(second.refresh_token.clone()));

        let err = h.controller.refresh(Some(&first.refresh_token)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenSuperseded)));
    }

    #[tokio::test]
    async fn refresh_rejects_valid_but_unstored_token() {
        let h = harness();
        let user = h.controller.register(ada()).await.unwrap();
        h.controller.login(ada_login()).await.unwrap();

        let forged = generate_refresh_token(user.id, &test_settings()).unwrap();
        let err = h.controller.refresh(Some(&forged)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenSuperseded)));
    }

    #[tokio::test]
    async fn refresh_rejects_missing_invalid_and_orphan_tokens() {
        let h = harness();

        let err = h.controller.refresh(None).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::MissingToken)));

        let err = h.controller.refresh(Some("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::MissingToken)));

        let err = h.controller.refresh(Some("garbage")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));

        let orphan = generate_refresh_token(Uuid::new_v4(), &test_settings()).unwrap();
        let err = h.controller.refresh(Some(&orphan)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn refresh_surfaces_store_failure() {
        let h = harness();
        h.controller.register(ada()).await.unwrap();
        let login = h.controller.login(ada_login()).await.unwrap();

        h.store.set_unavailable(true);
        let err = h
            .controller
            .refresh(Some(&login.tokens.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(DatabaseError::ConnectionPool(_))));
    }

    #[tokio::test]
    async fn concurrent_refresh_with_same_token_succeeds_once() {
        let store = Arc::new(YieldingStore::default());
        let controller =
            SessionController::new(store.clone(), Arc::new(StubMedia::default()), test_settings());
        let user = controller.register(ada()).await.unwrap();
        let login = controller.login(ada_login()).await.unwrap();
        let token = login.tokens.refresh_token;

        // both pass the stored-token check before either swaps
        let (a, b) = tokio::join!(
            controller.refresh(Some(&token)),
            controller.refresh(Some(&token))
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::Auth(AuthError::TokenSuperseded)))));
        assert_eq!(store.lost_swaps.load(Ordering::SeqCst), 1);

        let winner = outcomes.iter().find_map(|r| r.as_ref().ok()).unwrap();
        let stored = store.inner.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(winner.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn logout_clears_token_and_is_idempotent() {
        let h = harness();
        let user = h.controller.register(ada()).await.unwrap();
        let login = h.controller.login(ada_login()).await.unwrap();

        h.controller.logout(user.id).await.unwrap();
        assert!(stored_token(&h, user.id).await.is_none());
        h.controller.logout(user.id).await.expect("second logout failed");

        let err = h
            .controller
            .refresh(Some(&login.tokens.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenSuperseded)));
    }

    #[tokio::test]
    async fn current_user_returns_view() {
        let h = harness();
        let user = h.controller.register(ada()).await.unwrap();

        assert_eq!(h.controller.current_user(user.id).await.unwrap(), user);
        assert!(matches!(
            h.controller.current_user(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
