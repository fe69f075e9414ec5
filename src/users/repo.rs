use axum::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::error::AppError;
use crate::users::repo_types::{NewUser, User, UserProjection};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already taken")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateEmail => AppError::Conflict("User already exists".into()),
            RepoError::Database(e) => AppError::Database(e),
        }
    }
}

/// Persistence for user accounts, keyed by email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Fails with [`RepoError::DuplicateEmail`] when the email is already stored.
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;

    /// Overwrites name and password hash. `None` if no user has this email.
    async fn update_profile(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<Option<User>, RepoError>;

    /// Returns whether a record was removed.
    async fn delete_by_email(&self, email: &str) -> Result<bool, RepoError>;

    async fn list_projections(&self) -> Result<Vec<UserProjection>, RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, password_hash, image, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, full_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, full_name, email, password_hash, image, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepoError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_profile(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = $2, password_hash = $3
             WHERE email = $1
            RETURNING id, full_name, email, password_hash, image, created_at
            "#,
        )
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_by_email(&self, email: &str) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_projections(&self) -> Result<Vec<UserProjection>, RepoError> {
        let rows = sqlx::query_as::<_, UserProjection>(
            r#"
            SELECT full_name, email
              FROM users
             ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// In-process repository used by handler tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryUserRepository {
    users: std::sync::Mutex<Vec<User>>,
}

#[cfg(test)]
impl MemoryUserRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.lock().iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.lock();
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let row = User {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            image: None,
            created_at: time::OffsetDateTime::now_utc(),
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<Option<User>, RepoError> {
        let mut users = self.lock();
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            u.full_name = full_name.to_string();
            u.password_hash = password_hash.to_string();
            u.clone()
        }))
    }

    async fn delete_by_email(&self, email: &str) -> Result<bool, RepoError> {
        let mut users = self.lock();
        let before = users.len();
        users.retain(|u| u.email != email);
        Ok(users.len() != before)
    }

    async fn list_projections(&self) -> Result<Vec<UserProjection>, RepoError> {
        Ok(self
            .lock()
            .iter()
            .map(|u| UserProjection {
                full_name: u.full_name.clone(),
                email: u.email.clone(),
            })
            .collect())
    }
}
