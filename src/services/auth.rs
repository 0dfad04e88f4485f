use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use validator::ValidateEmail;

use super::char_len;
use crate::{
    auth::issue_token,
    config::AppConfig,
    error::{AppError, Result},
    models::{NewUser, Role, SignInRequest, SignUpRequest, TokenResponse, UserProfile},
    repository::{RepoError, RepositoryState},
};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 64;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?
        .to_string())
}

/// Unauthorized on mismatch, Internal when the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("invalid password hash: {}", e)))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized)
}

/// Runs Argon2 work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {}", e)))?
}

pub(crate) fn validate_name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if !(NAME_MIN..=NAME_MAX).contains(&char_len(value)) {
        return Err(AppError::validation(
            field,
            format!("must be between {} and {} characters", NAME_MIN, NAME_MAX),
        ));
    }
    Ok(value.to_string())
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::validation("email", "is not a valid email address"));
    }
    Ok(email)
}

/// AuthService
///
/// Account registration and password sign-in. Issued tokens carry the user id and
/// role; the extractor re-reads the role on every request anyway.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    config: AppConfig,
}

impl AuthService {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self { repo, config }
    }

    /// sign_up
    ///
    /// Creates a `user`-role account. A taken username or email is a Conflict.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<UserProfile> {
        let username = validate_name("username", &request.username)?;
        let nickname = validate_name("nickname", &request.nickname)?;
        let email = normalize_email(&request.email)?;
        if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&char_len(&request.password)) {
            return Err(AppError::validation(
                "password",
                format!("must be between {} and {} characters", PASSWORD_MIN, PASSWORD_MAX),
            ));
        }
        if request.password != request.confirm_password {
            return Err(AppError::validation("confirm_password", "does not match password"));
        }

        let password = request.password;
        let password_hash = blocking(move || hash_password(&password)).await?;

        let user = self
            .repo
            .create_user(NewUser {
                username,
                nickname,
                email,
                password_hash,
                avatar: None,
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                RepoError::UniqueViolation(_) => AppError::conflict("username or email is already registered"),
                other => other.into(),
            })?;

        tracing::info!(user_id = user.id, "account registered");
        Ok(UserProfile::own(&user))
    }

    /// sign_in
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<TokenResponse> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.repo.get_user_by_email(&email).await? else {
            tracing::debug!("sign-in for unknown email");
            return Err(AppError::Unauthorized);
        };

        let password = request.password;
        let hash = user.password_hash.clone();
        blocking(move || verify_password(&password, &hash)).await?;

        let token = issue_token(&self.config, user.id, user.role)?;
        tracing::info!(user_id = user.id, "signed in");
        Ok(TokenResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_ttl_secs,
        })
    }
}
