use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::{AppResult, MessageResponse},
    state::AppState,
    users::{
        dto::{CreateUserRequest, DeleteUserRequest, EditUserRequest, UserListItem, UserResponse},
        extractors::Payload,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(create_user))
        .route("/user/edit", put(edit_user))
        .route("/user/delete", delete(delete_user))
        .route("/user/getAll", get(list_users))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Payload(payload): Payload<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = services::create_user(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created successfully".into(),
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn edit_user(
    State(state): State<AppState>,
    Payload(payload): Payload<EditUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = services::edit_user(state.users.as_ref(), payload).await?;
    Ok(Json(UserResponse {
        message: "User updated successfully".into(),
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn delete_user(
    State(state): State<AppState>,
    Payload(payload): Payload<DeleteUserRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_user(state.users.as_ref(), payload).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserListItem>>> {
    let users = services::list_users(state.users.as_ref()).await?;
    Ok(Json(users))
}
