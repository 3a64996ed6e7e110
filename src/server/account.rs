use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireUser, SecretHasher};
use crate::server::AppState;
use crate::server::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_email, validate_password, validate_user_name};
use crate::types::{SessionToken, User, normalize_email};

fn issue_token(state: &Arc<AppState>, user_id: &str) -> Result<String, ApiError> {
    let hasher = SecretHasher::new();
    let (raw_token, lookup, hash) = hasher.generate_token()?;

    let token = SessionToken {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        user_id: user_id.to_string(),
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    state.db.create_session_token(&token)?;
    Ok(raw_token)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Some(required_code) = &state.config.registration_code {
        if req.invitation_code.as_deref() != Some(required_code.as_str()) {
            return Err(ApiError::forbidden("Registration requires an invitation code"));
        }
    }

    let email = validate_email(&req.email)?;
    let name = validate_user_name(&req.name)?;
    validate_password(&req.password)?;

    let hasher = SecretHasher::new();
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email_norm: normalize_email(&email),
        email,
        name,
        password_hash: hasher.hash(&req.password)?,
        scopes: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    match state.db.create_user(&user) {
        Ok(()) => {}
        Err(crate::error::Error::AlreadyExists) => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(e.into()),
    }

    let token = issue_token(&state, &user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = state
        .db
        .get_user_by_email(&normalize_email(&req.email))?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let hasher = SecretHasher::new();
    if !hasher.verify(&req.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = issue_token(&state, &user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(AuthResponse { token, user })))
}

pub async fn logout(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state.db.delete_session_token(&auth.token.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn me(auth: RequireUser) -> impl IntoResponse {
    Json(ApiResponse::success(auth.user))
}

pub async fn update_me(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<crate::server::dto::UpdateProfileRequest>,
) -> impl IntoResponse {
    let mut user = auth.user;

    if let Some(name) = req.name {
        user.name = validate_user_name(&name)?;
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        let hasher = SecretHasher::new();
        user.password_hash = hasher.hash(&password)?;
    }
    state.db.update_user(&user)?;

    let user = state
        .db
        .get_user(&user.id)?
        .ok_or(crate::error::Error::NotFound)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}
