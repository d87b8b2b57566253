//! User and role endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::roles::Role;
use crate::db::users::User;
use crate::error::ApiResult;
use crate::services::{RoleAssignment, RoleChangeOutcome, RoleOp};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default, alias = "phoneNumber")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhoneRequest {
    #[serde(alias = "phoneNumber")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .users
        .create_user(&request.email, request.phone_number.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.users.get_all_users().await?))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get_user_by_id(user_id).await?))
}

/// GET /users/by-email/:email
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get_user_by_email(&email).await?))
}

/// PUT /users/:id
pub async fn update_user_phone(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdatePhoneRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(
        state
            .users
            .update_user_phone(user_id, request.phone_number.as_deref())
            .await?,
    ))
}

/// DELETE /users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.delete_user(user_id).await?))
}

/// POST /users/roles/add
pub async fn add_role(
    State(state): State<AppState>,
    Json(assignment): Json<RoleAssignment>,
) -> ApiResult<Json<RoleChangeOutcome>> {
    Ok(Json(state.users.apply_role(&assignment, RoleOp::Add).await?))
}

/// POST /users/roles/remove
pub async fn remove_role(
    State(state): State<AppState>,
    Json(assignment): Json<RoleAssignment>,
) -> ApiResult<Json<RoleChangeOutcome>> {
    Ok(Json(state.users.apply_role(&assignment, RoleOp::Remove).await?))
}

/// POST /roles
pub async fn create_role(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state
        .users
        .create_role(&request.value, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /roles
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(state.users.list_roles().await?))
}

/// GET /roles/:value
pub async fn get_role(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.users.get_role_by_value(&value).await?))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user_phone).delete(delete_user),
        )
        .route("/users/by-email/:email", get(get_user_by_email))
        .route("/users/roles/add", post(add_role))
        .route("/users/roles/remove", post(remove_role))
        .route("/roles", post(create_role).get(list_roles))
        .route("/roles/:value", get(get_role))
}
