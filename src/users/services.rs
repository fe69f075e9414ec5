use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::users::dto::{
    present, CreateUserRequest, DeleteUserRequest, EditUserRequest, UserListItem, UserSummary,
};
use crate::users::repo::UserRepository;
use crate::users::repo_types::NewUser;

pub(crate) const PASSWORD_POLICY_MESSAGE: &str = "Password must be at least 8 characters long \
     and include a letter, a number, and a symbol (!@#$%^&*)";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 chars from `[A-Za-z0-9!@#$%^&*]` with one letter, one digit and one symbol.
pub(crate) fn meets_password_policy(password: &str) -> bool {
    lazy_static! {
        static ref ALLOWED_RE: Regex = Regex::new(r"^[A-Za-z0-9!@#$%^&*]{8,}$").unwrap();
        static ref LETTER_RE: Regex = Regex::new(r"[A-Za-z]").unwrap();
        static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
        static ref SYMBOL_RE: Regex = Regex::new(r"[!@#$%^&*]").unwrap();
    }
    ALLOWED_RE.is_match(password)
        && LETTER_RE.is_match(password)
        && DIGIT_RE.is_match(password)
        && SYMBOL_RE.is_match(password)
}

/// Argon2id with a fresh random salt per call.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Hashing is CPU bound; keep it off the async workers.
async fn hash_password_blocking(plain: String) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| anyhow::anyhow!("hash task failed: {e}"))??;
    Ok(hash)
}

pub async fn create_user(
    repo: &dyn UserRepository,
    req: CreateUserRequest,
) -> AppResult<UserSummary> {
    let (Some(full_name), Some(email), Some(password)) = (
        present(req.full_name),
        present(req.email),
        present(req.password),
    ) else {
        return Err(AppError::validation(
            "Please provide fullName, email, and password",
        ));
    };

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email format"));
    }

    if !meets_password_policy(&password) {
        warn!(%email, "password policy not met");
        return Err(AppError::validation(PASSWORD_POLICY_MESSAGE));
    }

    if repo.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password_blocking(password).await?;
    let user = repo
        .insert(NewUser {
            id: Uuid::new_v4(),
            full_name,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user.into())
}

pub async fn edit_user(repo: &dyn UserRepository, req: EditUserRequest) -> AppResult<UserSummary> {
    let (Some(email), Some(full_name), Some(password)) = (
        present(req.email),
        present(req.full_name),
        present(req.password),
    ) else {
        return Err(AppError::validation(
            "Please provide email, fullName, and password",
        ));
    };

    if !meets_password_policy(&password) {
        warn!(%email, "password policy not met");
        return Err(AppError::validation(PASSWORD_POLICY_MESSAGE));
    }

    let password_hash = hash_password_blocking(password).await?;
    let Some(user) = repo
        .update_profile(&email, &full_name, &password_hash)
        .await?
    else {
        warn!(%email, "edit of unknown user");
        return Err(AppError::not_found("User not found"));
    };

    info!(user_id = %user.id, email = %user.email, "user updated");
    Ok(user.into())
}

pub async fn delete_user(repo: &dyn UserRepository, req: DeleteUserRequest) -> AppResult<()> {
    let Some(email) = present(req.email) else {
        return Err(AppError::validation("Please provide an email"));
    };

    if !repo.delete_by_email(&email).await? {
        warn!(%email, "delete of unknown user");
        return Err(AppError::not_found("User not found"));
    }

    info!(%email, "user deleted");
    Ok(())
}

/// An empty collection is reported as not found rather than `[]`.
pub async fn list_users(repo: &dyn UserRepository) -> AppResult<Vec<UserListItem>> {
    let rows = repo.list_projections().await?;
    if rows.is_empty() {
        return Err(AppError::not_found("No users found"));
    }
    Ok(rows.into_iter().map(UserListItem::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::MemoryUserRepository;
    use argon2::{PasswordHash, PasswordVerifier};

    fn verify(plain: &str, hash: &str) -> bool {
        let parsed = PasswordHash::new(hash).expect("valid PHC string");
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    fn create_req(name: &str, email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            full_name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
    }

    #[test]
    fn password_policy() {
        assert!(meets_password_policy("Abc123!@"));
        assert!(meets_password_policy("abc12345&"));
        assert!(!meets_password_policy("abc12345"), "no symbol");
        assert!(!meets_password_policy("Ab1!"), "too short");
        assert!(!meets_password_policy("12345678!"), "no letter");
        assert!(!meets_password_policy("abcdefgh!"), "no digit");
        assert!(!meets_password_policy("Abc123!@ "), "space not allowed");
        assert!(!meets_password_policy("Abc123!@é"), "non-ascii not allowed");
    }

    #[test]
    fn hash_is_salted_and_verifies() {
        let a = hash_password("Abc123!@").expect("hash");
        let b = hash_password("Abc123!@").expect("hash");
        assert_ne!(a, b);
        assert!(!a.contains("Abc123!@"));
        assert!(verify("Abc123!@", &a));
        assert!(verify("Abc123!@", &b));
        assert!(!verify("wrong-password", &a));
    }

    #[tokio::test]
    async fn create_stores_hash_not_plaintext() {
        let repo = MemoryUserRepository::default();
        let summary = create_user(&repo, create_req("Ada", "ada@example.com", "Abc123!@"))
            .await
            .unwrap();
        assert_eq!(summary.email, "ada@example.com");

        let stored = repo.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, summary.id);
        assert_ne!(stored.password_hash, "Abc123!@");
        assert!(verify("Abc123!@", &stored.password_hash));
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let repo = MemoryUserRepository::default();

        let err = create_user(&repo, CreateUserRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide fullName, email, and password");

        let err = create_user(&repo, create_req("Ada", "", "Abc123!@"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide fullName, email, and password");

        let err = create_user(&repo, create_req("Ada", "not-an-email", "Abc123!@"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email format");

        let err = create_user(&repo, create_req("Ada", "ada@example.com", "abc12345"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), PASSWORD_POLICY_MESSAGE);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let repo = MemoryUserRepository::default();
        create_user(&repo, create_req("Ada", "ada@example.com", "Abc123!@"))
            .await
            .unwrap();
        let err = create_user(&repo, create_req("Other", "ada@example.com", "Xyz789#$"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test]
    async fn edit_rehashes_with_new_salt() {
        let repo = MemoryUserRepository::default();
        create_user(&repo, create_req("Ada", "ada@example.com", "Abc123!@"))
            .await
            .unwrap();
        let first = repo.find_by_email("ada@example.com").await.unwrap().unwrap();

        let edit = || EditUserRequest {
            email: Some("ada@example.com".into()),
            full_name: Some("Countess".into()),
            password: Some("New456#$".into()),
        };
        let summary = edit_user(&repo, edit()).await.unwrap();
        assert_eq!(summary.full_name, "Countess");
        assert_eq!(summary.id, first.id);
        let second = repo.find_by_email("ada@example.com").await.unwrap().unwrap();

        edit_user(&repo, edit()).await.unwrap();
        let third = repo.find_by_email("ada@example.com").await.unwrap().unwrap();

        assert_ne!(first.password_hash, second.password_hash);
        assert_ne!(second.password_hash, third.password_hash);
        assert!(verify("New456#$", &second.password_hash));
        assert!(verify("New456#$", &third.password_hash));
    }

    #[tokio::test]
    async fn edit_unknown_email_is_not_found() {
        let repo = MemoryUserRepository::default();
        let err = edit_user(
            &repo,
            EditUserRequest {
                email: Some("ghost@example.com".into()),
                full_name: Some("Ghost".into()),
                password: Some("Abc123!@".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn edit_checks_presence_then_policy() {
        let repo = MemoryUserRepository::default();
        let err = edit_user(&repo, EditUserRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please provide email, fullName, and password");

        let err = edit_user(
            &repo,
            EditUserRequest {
                email: Some("ghost@example.com".into()),
                full_name: Some("Ghost".into()),
                password: Some("short".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_then_list_is_not_found() {
        let repo = MemoryUserRepository::default();
        create_user(&repo, create_req("Ada", "ada@example.com", "Abc123!@"))
            .await
            .unwrap();

        let listed = list_users(&repo).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].full_name, "Ada");

        delete_user(
            &repo,
            DeleteUserRequest {
                email: Some("ada@example.com".into()),
            },
        )
        .await
        .unwrap();

        let err = list_users(&repo).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "No users found");

        let err = delete_user(
            &repo,
            DeleteUserRequest {
                email: Some("ada@example.com".into()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "User not found");

        let err = delete_user(&repo, DeleteUserRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide an email");
    }
}
