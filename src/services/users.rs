//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, UpdateUser, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by email and password, returning a JWT token and the user
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify a password against the stored argon2 hash
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// List all users
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    /// Create a new user (administrators only)
    pub async fn create_user(&self, caller: &UserClaims, user: CreateUser) -> AppResult<User> {
        caller.require_admin()?;
        user.validate()?;

        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict(format!(
                "A user with the email {} already exists",
                user.email.to_lowercase()
            )));
        }

        let password_hash = self.hash_password(&user.password)?;
        self.repository
            .users
            .create(&user, &password_hash, caller.user_id)
            .await
    }

    /// Update an existing user. Users may edit their own record; role
    /// changes are reserved to administrators.
    pub async fn update_user(
        &self,
        caller: &UserClaims,
        id: i32,
        user: UpdateUser,
    ) -> AppResult<User> {
        caller.require_admin_or_self(id)?;
        user.validate()?;

        if user.role.is_some() && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can change roles".to_string(),
            ));
        }

        if let Some(ref email) = user.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict(
                    "The email is already in use by another user".to_string(),
                ));
            }
        }

        let password_hash = match user.password {
            Some(ref password) => Some(self.hash_password(password)?),
            None => None,
        };

        self.repository
            .users
            .update(id, &user, password_hash, caller.user_id)
            .await
    }

    /// Delete a user (administrators only). Self-deletion is rejected, and
    /// so is deleting a user who operated loans.
    pub async fn delete_user(&self, caller: &UserClaims, id: i32) -> AppResult<()> {
        caller.require_admin()?;

        if id == caller.user_id {
            return Err(AppError::Forbidden(
                "You cannot delete your own account".to_string(),
            ));
        }

        let operated = self.repository.loans.count_for_operator(id).await?;
        if operated > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete: the user is the operator on {} loan(s)",
                operated
            )));
        }

        self.repository.users.delete(id, caller.user_id).await
    }
}
