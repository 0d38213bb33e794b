//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{AuditAction, NewAuditEntry},
        user::{CreateUser, UpdateUser, User},
    },
    repository::audit,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (authentication)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if email already exists, optionally excluding one user
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// List all users, newest first
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Create a new user with an already-hashed password
    pub async fn create(
        &self,
        user: &CreateUser,
        password_hash: &str,
        acting_user_id: i32,
    ) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, LOWER($2), $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.role)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "A user with the email {} already exists",
                user.email.to_lowercase()
            )),
            _ => AppError::from(e),
        })?;

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Create,
                entity_type: "User",
                entity_id: Some(created.id),
                acting_user_id: Some(acting_user_id),
                details: format!("User created: {} with role {}", created.email, created.role),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Update an existing user. Only provided fields change; the password,
    /// when present, must already be hashed.
    pub async fn update(
        &self,
        id: i32,
        user: &UpdateUser,
        password_hash: Option<String>,
        acting_user_id: i32,
    ) -> AppResult<User> {
        let existing = self.get_by_id(id).await?;
        let now = Utc::now();

        // Build dynamic update query
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $set:expr) => {
                if $field.is_some() {
                    sets.push(format!($set, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(user.name, "name = ${}");
        add_field!(user.email, "email = LOWER(${})");
        add_field!(user.role, "role = ${}");
        add_field!(password_hash, "password = ${}");
        let _ = param_idx;

        let query = format!("UPDATE users SET {} WHERE id = {}", sets.join(", "), id);

        let mut tx = self.pool.begin().await?;

        let mut builder = sqlx::query(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(user.name);
        bind_field!(user.email);
        bind_field!(user.role);
        bind_field!(password_hash);

        builder.execute(&mut *tx).await.map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("The email is already in use by another user".to_string())
            }
            _ => AppError::from(e),
        })?;

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Update,
                entity_type: "User",
                entity_id: Some(id),
                acting_user_id: Some(acting_user_id),
                details: format!("User updated: {}", existing.email),
            },
        )
        .await?;

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Delete a user, reassigning their audit entries to the deleting
    /// administrator so the trail survives without dangling references.
    /// Dependency checks (operator loans, self-deletion) live in the
    /// service layer.
    pub async fn delete(&self, id: i32, acting_admin_id: i32) -> AppResult<()> {
        let user = self.get_by_id(id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE audit_entries SET acting_user_id = $1 WHERE acting_user_id = $2")
            .bind(acting_admin_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Delete,
                entity_type: "User",
                entity_id: Some(id),
                acting_user_id: Some(acting_admin_id),
                details: format!("User deleted: {} ({})", user.email, user.name),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Count users
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
