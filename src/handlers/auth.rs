use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{CurrentUser, LoginRequest, LoginResponse, SignupRequest};
use crate::services::AuthService;
use crate::AppState;

/// Register a new user
/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>> {
    let user = AuthService::signup(&state.db, req).await?;
    Ok(Json(json!({
        "message": "Signup successful",
        "user": user,
    })))
}

/// Login user
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = AuthService::login(&state.db, &state.config, req).await?;
    Ok(Json(response))
}

/// Resolve the current identity from the bearer token
/// GET /api/auth/me
pub async fn me(Extension(current_user): Extension<CurrentUser>) -> Json<CurrentUser> {
    Json(current_user)
}
