use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::{User, UserProjection};

/// Request body for account creation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for editing an account, looked up by email.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserRequest {
    pub email: Option<String>,
}

/// Public part of the user returned after create or edit.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub full_name: String,
    pub email: String,
}

impl From<UserProjection> for UserListItem {
    fn from(p: UserProjection) -> Self {
        Self {
            full_name: p.full_name,
            email: p.email,
        }
    }
}

/// Treats absent, `null` and empty strings alike.
pub(crate) fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}
