use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Row for inserting a freshly created account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Name and email projection used by the bulk listing.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserProjection {
    pub full_name: String,
    pub email: String,
}
