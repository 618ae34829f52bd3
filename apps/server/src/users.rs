//! In-memory user API
//!
//! Stands in for the application's CRUD handlers: it logs through the facade
//! and relies on the request logging middleware for correlation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nexlog_core::{correlation, get_logger, log_info, log_warning, Logger, ResultExt};
use nexlog_gateway::HandlerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub uuid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Accepted and discarded; only here to exercise redaction
    #[serde(default, rename = "password")]
    pub _password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("first and last name must not be empty")]
    MissingName,
    #[error("email {0:?} is not valid")]
    InvalidEmail(String),
    #[error("user store is unavailable")]
    StoreUnavailable,
}

#[derive(Clone)]
pub struct UserState {
    users: Arc<DashMap<Uuid, User>>,
    logger: Logger,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            logger: get_logger("app.services.user"),
        }
    }
}

impl UserState {
    fn validate(&self, input: &CreateUser) -> Result<(), UserError> {
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(UserError::MissingName);
        }
        if !input.email.contains('@') {
            return Err(UserError::InvalidEmail(input.email.clone()));
        }
        Ok(())
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{uuid}", get(get_user).delete(delete_user))
        .route("/api/debug/panic", get(trigger_panic))
        .route("/api/debug/fail", get(trigger_failure))
        .with_state(UserState::default())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn list_users(State(state): State<UserState>) -> Json<Value> {
    let users: Vec<User> = state.users.iter().map(|entry| entry.value().clone()).collect();
    log_info!(state.logger, "Listed users", { "count": users.len() });
    Json(json!({ "success": true, "data": users }))
}

async fn create_user(
    State(state): State<UserState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    if let Err(e) = state.validate(&input) {
        log_warning!(state.logger, "Validation error creating user", { "reason": e.to_string() });
        return Err(HandlerError::with_status(StatusCode::UNPROCESSABLE_ENTITY, &e));
    }

    let user = User {
        uuid: Uuid::new_v4(),
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
        created_at: Utc::now(),
    };
    state.users.insert(user.uuid, user.clone());

    // Audit in the background; the correlation id follows the task
    let audit_logger = state.logger.clone();
    let user_id = user.uuid;
    tokio::spawn(correlation::propagate(async move {
        log_info!(audit_logger, "User creation audited", { "user_id": user_id });
    }));

    log_info!(state.logger, "Created user", { "user_id": user.uuid, "email": &user.email });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "User created successfully", "data": user })),
    ))
}

async fn get_user(
    State(state): State<UserState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Value>, HandlerError> {
    match state.users.get(&uuid) {
        Some(user) => Ok(Json(json!({ "success": true, "data": user.value() }))),
        None => Err(HandlerError::not_found(format!("user {uuid} not found"))),
    }
}

async fn delete_user(
    State(state): State<UserState>,
    Path(uuid): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    match state.users.remove(&uuid) {
        Some(_) => {
            log_info!(state.logger, "Deleted user", { "user_id": uuid });
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(HandlerError::not_found(format!("user {uuid} not found"))),
    }
}

async fn trigger_panic() -> &'static str {
    panic!("simulated handler panic");
}

async fn trigger_failure(State(state): State<UserState>) -> Result<Json<Value>, HandlerError> {
    let result: Result<Value, UserError> = Err(UserError::StoreUnavailable);
    let value = result
        .log_exception(&state.logger, "User store lookup failed")
        .map_err(|e| HandlerError::with_status(StatusCode::SERVICE_UNAVAILABLE, &e))?;
    Ok(Json(value))
}
