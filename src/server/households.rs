use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::core::{access, invites, membership};
use crate::server::AppState;
use crate::server::dto::{
    CreateHouseholdRequest, CreateInvitationRequest, MemberResponse, SetRoleRequest,
    UpdateHouseholdRequest,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_household_name;
use crate::types::{Household, HouseholdMember, Role};

pub async fn create_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateHouseholdRequest>,
) -> impl IntoResponse {
    let name = validate_household_name(&req.name)?;
    let db = state.db.as_ref();

    let now = Utc::now();
    let household = Household {
        id: Uuid::new_v4().to_string(),
        name,
        created_by: auth.user.id.clone(),
        updated_by: auth.user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    let owner = HouseholdMember {
        household_id: household.id.clone(),
        user_id: auth.user.id.clone(),
        role: Role::Owner,
        created_at: now,
    };
    db.create_household(&household, &owner)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(household)))
}

pub async fn list_households(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let households = state.db.list_households_for_user(&auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(households)))
}

pub async fn get_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (household, _) =
        access::require_household_role(state.db.as_ref(), &auth.user.id, &id, Role::Viewer)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(household)))
}

pub async fn update_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateHouseholdRequest>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    let (mut household, _) =
        access::require_household_role(db, &auth.user.id, &id, Role::Editor)?;

    if let Some(name) = req.name {
        household.name = validate_household_name(&name)?;
    }
    household.updated_by = auth.user.id.clone();
    db.update_household(&household)?;

    let household = db.get_household(&id)?.ok_or(crate::error::Error::NotFound)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(household)))
}

pub async fn delete_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    access::require_household_role(db, &auth.user.id, &id, Role::Owner)?;
    db.delete_household(&id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let db = state.db.as_ref();
    access::require_household_role(db, &auth.user.id, &id, Role::Viewer)?;

    let members = db.list_household_members(&id)?;
    let mut responses = Vec::with_capacity(members.len());
    for member in members {
        if let Some(user) = db.get_user(&member.user_id)? {
            responses.push(MemberResponse {
                user_id: user.id,
                name: user.name,
                email: user.email,
                role: member.role,
                created_at: member.created_at,
            });
        }
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(responses)))
}

#[derive(serde::Deserialize)]
pub struct MemberPath {
    pub id: String,
    pub user_id: String,
}

pub async fn set_member_role(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<MemberPath>,
    Json(req): Json<SetRoleRequest>,
) -> impl IntoResponse {
    membership::set_household_role(
        state.db.as_ref(),
        &path.id,
        &path.user_id,
        req.role,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<MemberPath>,
) -> impl IntoResponse {
    membership::remove_household_member(
        state.db.as_ref(),
        &path.id,
        &path.user_id,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn leave_household(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    membership::leave_household(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn create_invitation(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateInvitationRequest>,
) -> impl IntoResponse {
    let invitation = invites::create_household_invitation(
        state.db.as_ref(),
        &id,
        &req.email,
        req.role,
        &auth.user.id,
    )?;
    Ok::<_, ApiError>(Json(ApiResponse::success(invitation)))
}

pub async fn list_invitations(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let invitations =
        invites::list_household_invitations(state.db.as_ref(), &id, &auth.user.id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(invitations)))
}

#[derive(serde::Deserialize)]
pub struct InvitationPath {
    pub id: String,
    pub invitation_id: String,
}

pub async fn retract_invitation(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(path): Path<InvitationPath>,
) -> impl IntoResponse {
    // The household id in the path is advisory; the invitation row is the
    // source of truth and core checks the scope it belongs to.
    let db = state.db.as_ref();
    if let Some(invitation) = db.get_household_invitation(&path.invitation_id)? {
        if invitation.household_id != path.id {
            return Err(ApiError::not_found("Not found"));
        }
    }
    invites::retract_household_invitation(db, &path.invitation_id, &auth.user.id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
